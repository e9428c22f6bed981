//! Buffer growth policy.

/// Returns a capacity comfortably above `minimum` elements of `width`
/// bytes each.
///
/// Adds an eighth (at least 3 elements) of headroom, then rounds so that
/// small elements fill whole 8-byte words.
#[must_use]
pub fn oversize(minimum: usize, width: usize) -> usize {
    let extra = (minimum / 8).max(3);
    let amount = minimum.saturating_add(extra);
    match width {
        1 => round_up(amount, 8),
        2 => round_up(amount, 4),
        4 => round_up(amount, 2),
        _ => amount,
    }
}

fn round_up(amount: usize, multiple: usize) -> usize {
    amount.checked_next_multiple_of(multiple).unwrap_or(amount)
}

/// Grows `buf` so it can hold at least `minimum` elements, using
/// [`oversize`] to pick the new capacity.
pub fn grow<T>(buf: &mut Vec<T>, minimum: usize) {
    if buf.capacity() < minimum {
        let target = oversize(minimum, std::mem::size_of::<T>());
        buf.reserve_exact(target - buf.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_headroom() {
        assert_eq!(oversize(0, 8), 3);
        assert_eq!(oversize(80, 8), 90);
        assert_eq!(oversize(1000, 16), 1125);
    }

    #[test]
    fn rounds_small_widths_to_words() {
        assert_eq!(oversize(10, 1), 16);
        assert_eq!(oversize(10, 2), 16);
        assert_eq!(oversize(10, 4), 14);
        assert_eq!(oversize(usize::MAX, 1), usize::MAX);
    }

    #[test]
    fn grow_reserves_oversized() {
        let mut buf: Vec<u64> = Vec::new();
        grow(&mut buf, 5);
        assert!(buf.capacity() >= 8);
        let cap = buf.capacity();
        grow(&mut buf, 2);
        assert_eq!(buf.capacity(), cap);
    }
}
