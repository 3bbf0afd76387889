//! The typed, shaped array segment exchanged with the storage layer.

use bytemuck::{Pod, PodCastError, Zeroable};
use ndarray::{ArrayD, IxDyn};

use crate::error::PcmpackError;
use crate::types::SampleDtype;
use crate::utils::checked_product;

/// A typed N-dimensional chunk. The storage layer produces one of these per
/// encode call and receives one back from every successful decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Float32(ArrayD<f32>),
}

macro_rules! impl_from_array {
    ($T:ty, $variant:ident) => {
        impl From<ArrayD<$T>> for Chunk {
            fn from(array: ArrayD<$T>) -> Self {
                Chunk::$variant(array)
            }
        }
    };
}

impl_from_array!(i8, Int8);
impl_from_array!(i16, Int16);
impl_from_array!(i32, Int32);
impl_from_array!(f32, Float32);

/// Casts raw element bytes to `Vec<T>`. Storage buffers carry no alignment
/// guarantee, so a misaligned slice is copied into an aligned buffer instead.
fn pod_vec<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, PcmpackError> {
    match bytemuck::try_cast_slice::<u8, T>(bytes) {
        Ok(words) => Ok(words.to_vec()),
        Err(PodCastError::TargetAlignmentGreaterAndInputNotAligned) => {
            let width = std::mem::size_of::<T>();
            if bytes.len() % width != 0 {
                return Err(PodCastError::OutputSliceWouldHaveSlop.into());
            }
            let mut words = vec![<T as Zeroable>::zeroed(); bytes.len() / width];
            bytemuck::try_cast_slice_mut::<T, u8>(&mut words)?.copy_from_slice(bytes);
            Ok(words)
        }
        Err(e) => Err(e.into()),
    }
}

/// Row-major element bytes of `array`, whatever its memory layout.
fn pod_bytes<T: Pod>(array: &ArrayD<T>) -> Vec<u8> {
    match array.as_slice() {
        Some(words) => bytemuck::cast_slice(words).to_vec(),
        None => {
            let words: Vec<T> = array.iter().copied().collect();
            bytemuck::cast_slice(&words).to_vec()
        }
    }
}

impl Chunk {
    /// Builds a chunk from raw little-endian element bytes, the way a storage
    /// layer hands over a contiguous buffer.
    pub fn from_bytes(
        dtype: SampleDtype,
        shape: &[usize],
        bytes: &[u8],
    ) -> Result<Self, PcmpackError> {
        let width = dtype.byte_width();
        if bytes.len() % width != 0 {
            return Err(PcmpackError::BufferMismatch(bytes.len(), width));
        }
        let expected = checked_product(shape).ok_or_else(|| {
            PcmpackError::InvalidArgument(format!("Shape {:?} overflows usize", shape))
        })?;
        if bytes.len() / width != expected {
            return Err(PcmpackError::InvalidArgument(format!(
                "Buffer holds {} {} elements but shape {:?} needs {}",
                bytes.len() / width,
                dtype,
                shape,
                expected
            )));
        }

        let dim = IxDyn(shape);
        let chunk = match dtype {
            SampleDtype::Int8 => Chunk::Int8(ArrayD::from_shape_vec(dim, pod_vec(bytes)?)?),
            SampleDtype::Int16 => Chunk::Int16(ArrayD::from_shape_vec(dim, pod_vec(bytes)?)?),
            SampleDtype::Int32 => Chunk::Int32(ArrayD::from_shape_vec(dim, pod_vec(bytes)?)?),
            SampleDtype::Float32 => {
                Chunk::Float32(ArrayD::from_shape_vec(dim, pod_vec(bytes)?)?)
            }
        };
        Ok(chunk)
    }

    /// Serializes the elements in row-major order as little-endian bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Chunk::Int8(a) => pod_bytes(a),
            Chunk::Int16(a) => pod_bytes(a),
            Chunk::Int32(a) => pod_bytes(a),
            Chunk::Float32(a) => pod_bytes(a),
        }
    }

    pub fn dtype(&self) -> SampleDtype {
        match self {
            Chunk::Int8(_) => SampleDtype::Int8,
            Chunk::Int16(_) => SampleDtype::Int16,
            Chunk::Int32(_) => SampleDtype::Int32,
            Chunk::Float32(_) => SampleDtype::Float32,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Chunk::Int8(a) => a.shape(),
            Chunk::Int16(a) => a.shape(),
            Chunk::Int32(a) => a.shape(),
            Chunk::Float32(a) => a.shape(),
        }
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        match self {
            Chunk::Int8(a) => a.len(),
            Chunk::Int16(a) => a.len(),
            Chunk::Int32(a) => a.len(),
            Chunk::Float32(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the uncompressed elements in bytes.
    pub fn nbytes(&self) -> usize {
        self.len() * self.dtype().byte_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_to_bytes_preserves_layout() {
        let values: Vec<i16> = vec![1, -2, 300, -400, 5, 6];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

        let chunk = Chunk::from_bytes(SampleDtype::Int16, &[3, 2], &bytes).unwrap();
        assert_eq!(chunk.shape(), &[3, 2]);
        assert_eq!(chunk.dtype(), SampleDtype::Int16);
        assert_eq!(chunk.nbytes(), 12);
        assert_eq!(chunk.to_bytes(), bytes);
    }

    #[test]
    fn test_from_bytes_rejects_shape_mismatch() {
        let bytes = vec![0u8; 12];
        let result = Chunk::from_bytes(SampleDtype::Int32, &[4], &bytes);
        assert!(matches!(result, Err(PcmpackError::InvalidArgument(_))));

        let result = Chunk::from_bytes(SampleDtype::Int32, &[3], &bytes[..11]);
        assert!(matches!(result, Err(PcmpackError::BufferMismatch(11, 4))));
    }

    #[test]
    fn test_from_bytes_accepts_misaligned_buffers() {
        let values: Vec<f32> = vec![1.5, -0.0, f32::INFINITY, 3.25];
        let mut backing = vec![0u8];
        backing.extend(values.iter().flat_map(|v| v.to_le_bytes()));
        let misaligned = &backing[1..];

        let chunk = Chunk::from_bytes(SampleDtype::Float32, &[2, 2], misaligned).unwrap();
        match &chunk {
            Chunk::Float32(a) => {
                let bits: Vec<u32> = a.iter().map(|v| v.to_bits()).collect();
                let expected: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
                assert_eq!(bits, expected);
            }
            other => panic!("unexpected chunk {:?}", other),
        }
        assert_eq!(chunk.to_bytes(), misaligned);
    }

    #[test]
    fn test_pod_vec_reports_slop_as_cast_error() {
        let backing = vec![0u8; 8];
        let result = pod_vec::<i32>(&backing[1..]);
        assert!(matches!(result, Err(PcmpackError::PodCast(_))));
    }

    #[test]
    fn test_to_bytes_follows_logical_order_for_transposed_views() {
        let array = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1i8, 2, 3, 4]).unwrap();
        let chunk = Chunk::from(array.reversed_axes());
        assert_eq!(chunk.to_bytes(), vec![1, 3, 2, 4]);
    }
}
