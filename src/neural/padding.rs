//! Spatial size arithmetic for strided convolutions.
//!
//! Sizes are given in tensor axis order of a channel-first batch, i.e.
//! `[dim2, dim3]`. For observations permuted from `(B, W, H, C)` that is
//! `[width, height]`.

/// Zero padding around the two trailing axes.
/// `left`/`right` pad the last axis, `top`/`bottom` the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding2d {
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
}

impl Padding2d {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Padded size of `[dim2, dim3]`.
    pub fn apply(&self, in_size: [i64; 2]) -> [i64; 2] {
        [
            in_size[0] + self.top + self.bottom,
            in_size[1] + self.left + self.right,
        ]
    }
}

/// Output length of an unpadded convolution along one axis.
pub fn conv_output_size(in_size: i64, kernel: i64, stride: i64) -> i64 {
    if in_size < kernel {
        return 0;
    }
    (in_size - kernel) / stride + 1
}

/// Padding that lets a `kernel`/`stride` convolution cover every input
/// position, and the resulting output size (`ceil(in / stride)` per axis).
///
/// The total padding along an axis is split in half, with the odd element
/// going after the input.
pub fn valid_padding(in_size: [i64; 2], kernel: i64, stride: i64) -> (Padding2d, [i64; 2]) {
    let pad_along = |size: i64| {
        let out = (size + stride - 1) / stride;
        ((out - 1) * stride + kernel - size).max(0)
    };

    let pad_rows = pad_along(in_size[0]);
    let pad_cols = pad_along(in_size[1]);
    let padding = Padding2d {
        left: pad_cols / 2,
        right: pad_cols - pad_cols / 2,
        top: pad_rows / 2,
        bottom: pad_rows - pad_rows / 2,
    };

    let padded = padding.apply(in_size);
    let out_size = [
        conv_output_size(padded[0], kernel, stride),
        conv_output_size(padded[1], kernel, stride),
    ];
    (padding, out_size)
}
