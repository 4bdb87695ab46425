//! Fixed-width little-endian values stored inline in tables and headers.
//!
//! Every read goes through a checked slice of exactly [`Scalar::SIZE`] bytes
//! and `from_le_bytes`; nothing in the crate reinterprets buffer memory as a
//! typed value. Alignment is never assumed.

mod private {
    pub trait Sealed {}
}

/// Marker trait for values with a fixed little-endian wire representation.
///
/// This trait is sealed: the wire format only knows the widths implemented
/// here.
pub trait Scalar: private::Sealed + Copy + PartialEq + Sized {
    /// The byte width on the wire.
    const SIZE: usize;
    /// Encode into the first `SIZE` bytes of `dst`.
    fn write_le(self, dst: &mut [u8]);
    /// Decode from the first `SIZE` bytes of `src`.
    fn read_le(src: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {$(
        impl private::Sealed for $t {}

        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            #[inline]
            fn write_le(self, dst: &mut [u8]) {
                dst[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(src: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&src[..Self::SIZE]);
                <$t>::from_le_bytes(raw)
            }
        }
    )*};
}

impl_scalar!(u8, u16, u32, i32);

/// Read a `T` at `pos`, or `None` if the value would extend past `buf`.
#[inline]
pub(crate) fn read_at<T: Scalar>(buf: &[u8], pos: usize) -> Option<T> {
    let end = pos.checked_add(T::SIZE)?;
    buf.get(pos..end).map(T::read_le)
}

/// Zero bytes needed so that `size` becomes a multiple of `align` (a power of two).
#[inline]
pub(crate) fn padding_bytes(size: usize, align: usize) -> usize {
    (!size).wrapping_add(1) & (align - 1)
}
