use num_traits::{CheckedAdd, One};
use std::iter::successors;

/// Terms of the Fibonacci sequence used by Fibonacci coding: 1, 2, 3, 5, 8...
///
/// The iterator ends after the largest term representable by `T`.
pub(crate) fn fibonacci_terms<T>() -> impl Iterator<Item = T>
where
    T: CheckedAdd + One + Copy,
{
    let one = T::one();
    successors(Some((one, one.checked_add(&one))), |&(a, b)| {
        let b = b?;
        Some((b, a.checked_add(&b)))
    })
    .map(|(a, _)| a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_correct() {
        assert_eq!(
            fibonacci_terms::<u16>().take(16).collect::<Vec<_>>(),
            vec![1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377, 610, 987, 1597]
        );
    }

    #[test]
    fn stops_before_overflow() {
        assert_eq!(
            fibonacci_terms::<u8>().collect::<Vec<_>>(),
            vec![1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233]
        );
    }
}
