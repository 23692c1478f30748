use obseq_diff::{apply, diff, Edit};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

fn seeds() -> [u64; 12] {
    [
        0x5eed_c0de_u64,
        0x0000_0000_0000_0001_u64,
        0x0000_0000_0000_00ff_u64,
        0x0000_0000_00c0_ffee_u64,
        0x0123_4567_89ab_cdef_u64,
        0x0000_0000_0000_1001_u64,
        0x0000_0000_0000_2002_u64,
        0xdead_beef_dead_beef_u64,
        0x0f0f_0f0f_0f0f_0f0f_u64,
        0xffff_ffff_ffff_fffe_u64,
        0x0000_0000_0a0b_0c0d_u64,
        0x7777_7777_7777_7777_u64,
    ]
}

fn random_sequence(rng: &mut Xoshiro256PlusPlus, max_len: usize, alphabet: u8) -> Vec<u8> {
    let len = rng.gen_range(0..=max_len);
    (0..len).map(|_| rng.gen_range(0..alphabet)).collect()
}

/// Mutates `base` with a handful of random splices, so the pair shares
/// realistic common subsequences instead of being independent noise.
fn mutated(rng: &mut Xoshiro256PlusPlus, base: &[u8], alphabet: u8) -> Vec<u8> {
    let mut out = base.to_vec();
    let edits = rng.gen_range(0..=4);
    for _ in 0..edits {
        if !out.is_empty() && rng.gen_bool(0.5) {
            let at = rng.gen_range(0..out.len());
            out.remove(at);
        } else {
            let at = rng.gen_range(0..=out.len());
            out.insert(at, rng.gen_range(0..alphabet));
        }
    }
    out
}

#[test]
fn differential_edit_script_replays_to_target() {
    for seed in seeds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for case in 0..50 {
            let old = random_sequence(&mut rng, 24, 6);
            let new = if case % 2 == 0 {
                mutated(&mut rng, &old, 6)
            } else {
                random_sequence(&mut rng, 24, 6)
            };
            let script = diff(&old, &new);
            assert_eq!(
                apply(&old, &script),
                new,
                "replay mismatch seed={seed} case={case} old={old:?} new={new:?}"
            );
        }
    }
}

#[test]
fn differential_edit_script_is_deterministic() {
    for seed in seeds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for _ in 0..50 {
            let old = random_sequence(&mut rng, 24, 6);
            let new = mutated(&mut rng, &old, 6);
            assert_eq!(diff(&old, &new), diff(&old, &new), "seed={seed}");
        }
    }
}

#[test]
fn differential_edit_script_identity_is_empty() {
    for seed in seeds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for _ in 0..50 {
            let a = random_sequence(&mut rng, 32, 4);
            assert!(diff(&a, &a).is_empty(), "seed={seed} a={a:?}");
        }
    }
}

#[test]
fn differential_edit_script_length_matches_lcs_bound() {
    // The script is minimal iff its length equals n + m - 2 * LCS(old, new).
    for seed in seeds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for _ in 0..30 {
            let old = random_sequence(&mut rng, 14, 4);
            let new = mutated(&mut rng, &old, 4);
            let script = diff(&old, &new);
            let bound = old.len() + new.len() - 2 * lcs_len(&old, &new);
            assert_eq!(script.len(), bound, "seed={seed} old={old:?} new={new:?}");
            let removes = script.iter().filter(|e| e.is_remove()).count();
            let inserts = script.iter().filter(|e| matches!(e, Edit::Insert { .. })).count();
            assert_eq!(removes + inserts, script.len());
        }
    }
}

fn lcs_len(a: &[u8], b: &[u8]) -> usize {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table[a.len()][b.len()]
}
