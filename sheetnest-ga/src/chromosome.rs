use rand::Rng;
use rand::seq::SliceRandom;

/// Genotype of an individual: a placement order over all units and a rotation gene per unit.
///
/// `rotations` is indexed by unit, not by position in `order`, so reordering keeps every
/// unit's rotation attached to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chromosome {
    pub order: Vec<usize>,
    /// Index into the list of allowed rotations
    pub rotations: Vec<usize>,
}

impl Chromosome {
    /// Places units in the given order, all unrotated
    pub fn from_order(order: Vec<usize>) -> Self {
        let rotations = vec![0; order.len()];
        Chromosome { order, rotations }
    }

    pub fn random(n_units: usize, n_rotations: usize, rng: &mut impl Rng) -> Self {
        let mut order: Vec<usize> = (0..n_units).collect();
        order.shuffle(rng);
        let rotations = (0..n_units)
            .map(|_| rng.random_range(0..n_rotations.max(1)))
            .collect();
        Chromosome { order, rotations }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Order crossover (OX): a random slice of `self` is kept in place, the remaining positions
    /// are filled with the missing units in the order they appear in `other`, starting after the slice.
    /// Rotation genes are inherited uniformly from either parent.
    pub fn order_crossover(&self, other: &Self, rng: &mut impl Rng) -> Self {
        let n = self.len();
        if n < 2 {
            return self.clone();
        }

        let (mut p1, mut p2) = (rng.random_range(0..n), rng.random_range(0..n));
        if p1 > p2 {
            std::mem::swap(&mut p1, &mut p2);
        }

        let mut order = vec![usize::MAX; n];
        let mut used = vec![false; n];
        for i in p1..=p2 {
            order[i] = self.order[i];
            used[self.order[i]] = true;
        }

        let mut donor = other
            .order
            .iter()
            .cycle()
            .skip(p2 + 1)
            .take(n)
            .filter(|&&u| !used[u]);
        for k in 1..=n {
            let idx = (p2 + k) % n;
            if order[idx] == usize::MAX {
                //the donor holds exactly the units missing from the kept slice
                if let Some(&u) = donor.next() {
                    order[idx] = u;
                }
            }
        }

        let rotations = self
            .rotations
            .iter()
            .zip(&other.rotations)
            .map(|(&a, &b)| if rng.random::<bool>() { a } else { b })
            .collect();

        Chromosome { order, rotations }
    }

    /// Swaps two random positions of the order
    pub fn swap_mutate(&mut self, rng: &mut impl Rng) {
        let n = self.len();
        if n < 2 {
            return;
        }
        let i = rng.random_range(0..n);
        let j = rng.random_range(0..n);
        self.order.swap(i, j);
    }

    /// Reverses a random slice of the order
    pub fn inversion_mutate(&mut self, rng: &mut impl Rng) {
        let n = self.len();
        if n < 2 {
            return;
        }
        let (mut i, mut j) = (rng.random_range(0..n), rng.random_range(0..n));
        if i > j {
            std::mem::swap(&mut i, &mut j);
        }
        self.order[i..=j].reverse();
    }

    /// Gives a random unit a different rotation
    pub fn rotation_mutate(&mut self, n_rotations: usize, rng: &mut impl Rng) {
        if self.is_empty() || n_rotations < 2 {
            return;
        }
        let unit = rng.random_range(0..self.len());
        let shift = rng.random_range(1..n_rotations);
        self.rotations[unit] = (self.rotations[unit] + shift) % n_rotations;
    }

    /// Whether `order` is a permutation of `0..len`
    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.len()];
        self.order.iter().all(|&u| {
            u < seen.len() && !std::mem::replace(&mut seen[u], true)
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::prelude::SmallRng;

    use super::*;

    #[test]
    fn crossover_produces_permutations() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..200 {
            let a = Chromosome::random(12, 4, &mut rng);
            let b = Chromosome::random(12, 4, &mut rng);
            let child = a.order_crossover(&b, &mut rng);
            assert!(child.is_permutation());
            assert!(child.rotations.iter().all(|&r| r < 4));
        }
    }

    #[test]
    fn mutations_keep_permutations() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut c = Chromosome::random(9, 2, &mut rng);
        for _ in 0..100 {
            c.swap_mutate(&mut rng);
            c.inversion_mutate(&mut rng);
            c.rotation_mutate(2, &mut rng);
            assert!(c.is_permutation());
        }
    }

    #[test]
    fn rotation_mutation_always_changes_the_gene() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut c = Chromosome::from_order(vec![0]);
        for _ in 0..20 {
            let before = c.rotations[0];
            c.rotation_mutate(4, &mut rng);
            assert_ne!(c.rotations[0], before);
        }
    }

    #[test]
    fn tiny_chromosomes_survive_operators() {
        let mut rng = SmallRng::seed_from_u64(0);
        let single = Chromosome::from_order(vec![0]);
        assert_eq!(single.order_crossover(&single, &mut rng), single);
        let mut empty = Chromosome::from_order(vec![]);
        empty.swap_mutate(&mut rng);
        empty.inversion_mutate(&mut rng);
        empty.rotation_mutate(4, &mut rng);
        assert!(empty.is_empty());
    }
}
