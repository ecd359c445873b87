/// Length of the per-worker content buffer.
pub const CONTENT_SIZE: usize = 1 << 20;

/// Lower bound of a chunk handed to a single store call. Chunks are drawn from
/// `[CHUNK_BASE_SIZE, 2 * CHUNK_BASE_SIZE)`.
pub const CHUNK_BASE_SIZE: u32 = (CONTENT_SIZE / 2) as u32;

const M: u32 = 2_147_483_647;
const A: u64 = 16_807;

/// Park-Miller "minimal standard" generator over 31 bits.
///
/// Every worker owns exactly one of these. Its output must stay bit-for-bit
/// stable, since a read run only verifies when it replays the draws of the
/// put run that produced the files.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    state: u32,
}

impl RandomGenerator {
    pub fn new(seed: u32) -> Self {
        RandomGenerator { state: seed & M }
    }

    /// Seeds that lock the generator on a fixed point instead of cycling.
    pub fn is_degenerate_seed(seed: u32) -> bool {
        let s = seed & M;
        s == 0 || s == M
    }

    pub fn next_u32(&mut self) -> u32 {
        let product = self.state as u64 * A;
        self.state = ((product >> 31) + (product & M as u64)) as u32;
        if self.state > M {
            self.state -= M;
        }
        self.state
    }

    /// Value in `[0, n)`. Plain modulo, the bias is part of the recorded output.
    pub fn uniform(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }

    /// Size of the next put/read chunk.
    pub fn chunk_size(&mut self) -> usize {
        (CHUNK_BASE_SIZE + self.uniform(CHUNK_BASE_SIZE)) as usize
    }
}

/// Builds the base content of a worker: one byte per draw, offset from `' '`
/// and truncated to 8 bits.
pub fn random_string(rng: &mut RandomGenerator, size: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    for b in bytes.iter_mut() {
        *b = (b' ' as u32).wrapping_add(rng.next_u32()) as u8;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_minimal_standard_sequence() {
        let mut rng = RandomGenerator::new(1);
        assert_eq!(rng.next_u32(), 16_807);
        assert_eq!(rng.next_u32(), 282_475_249);
        assert_eq!(rng.next_u32(), 1_622_650_073);
        assert_eq!(rng.next_u32(), 984_943_658);
        assert_eq!(rng.next_u32(), 1_144_108_930);
    }

    #[test]
    fn ten_thousandth_value() {
        let mut rng = RandomGenerator::new(1);
        let mut last = 0;
        for _ in 0..10_000 {
            last = rng.next_u32();
        }
        assert_eq!(last, 1_043_618_065);
    }

    #[test]
    fn seed_is_masked_to_31_bits() {
        let mut a = RandomGenerator::new(301);
        let mut b = RandomGenerator::new(301 | 0x8000_0000);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomGenerator::new(301);
        let mut b = RandomGenerator::new(301);
        let xs: Vec<u32> = (0..1000).map(|_| a.next_u32()).collect();
        let ys: Vec<u32> = (0..1000).map(|_| b.next_u32()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&x| x > 0 && x < M));
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = RandomGenerator::new(42);
        for n in [1u32, 2, 7, 1000, CHUNK_BASE_SIZE] {
            for _ in 0..1000 {
                assert!(rng.uniform(n) < n);
            }
        }
    }

    #[test]
    fn chunk_size_bounds() {
        let mut rng = RandomGenerator::new(7);
        for _ in 0..10_000 {
            let c = rng.chunk_size();
            assert!((524_288..=1_048_575).contains(&c), "chunk {c}");
        }
    }

    #[test]
    fn degenerate_seeds() {
        assert!(RandomGenerator::is_degenerate_seed(0));
        assert!(RandomGenerator::is_degenerate_seed(0x8000_0000));
        assert!(RandomGenerator::is_degenerate_seed(M));
        assert!(!RandomGenerator::is_degenerate_seed(301));

        let mut stuck = RandomGenerator::new(M);
        assert_eq!(stuck.next_u32(), M);
        assert_eq!(stuck.next_u32(), M);
    }

    #[test]
    fn random_string_truncates_offset_draws() {
        let mut rng = RandomGenerator::new(1);
        let s = random_string(&mut rng, 2);
        // (32 + 16807) % 256, (32 + 282475249) % 256
        assert_eq!(s, vec![199, 17]);
    }

    #[test]
    fn random_string_is_deterministic() {
        let a = random_string(&mut RandomGenerator::new(301), CONTENT_SIZE);
        let b = random_string(&mut RandomGenerator::new(301), CONTENT_SIZE);
        let c = random_string(&mut RandomGenerator::new(302), CONTENT_SIZE);
        assert_eq!(a.len(), CONTENT_SIZE);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(random_string(&mut RandomGenerator::new(5), 0).is_empty());
    }
}
