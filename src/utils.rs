use std::collections::VecDeque;

/// Move the back half of a sequence into a new one of the same type.
///
/// The split-off part holds `len / 2` elements, so the original keeps the
/// extra element when the length is odd.
pub(crate) trait SplitOffHalf: Sized {
    fn split_off_half(&mut self) -> Self;
}

#[inline]
fn half_split_point(len: usize) -> usize {
    len.checked_sub(len / 2).expect("SplitOffHalf::split_off_half")
}

impl<T> SplitOffHalf for VecDeque<T> {
    #[inline]
    fn split_off_half(&mut self) -> Self {
        self.split_off(half_split_point(self.len()))
    }
}

impl<T> SplitOffHalf for Vec<T> {
    #[inline]
    fn split_off_half(&mut self) -> Self {
        self.split_off(half_split_point(self.len()))
    }
}
