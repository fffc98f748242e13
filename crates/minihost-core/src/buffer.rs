//! Planar audio buffers and zero-copy block views.
//!
//! Processing entry points take an [`AudioBlock`]: an input view and an output
//! view over caller-owned channel storage, each carrying its own start frame
//! and frame count. Sub-windows ([`AudioBlock::window`]) re-point the same
//! storage without copying, and every sample access is bounds-checked.

use crate::{Error, Result};
use std::ops::Range;

/// Sample type a block can carry.
pub trait Sample: Copy + Default + PartialEq + core::fmt::Debug + Send + Sync + 'static {
    const ZERO: Self;

    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;
}

impl Sample for f32 {
    const ZERO: Self = 0.0;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for f64 {
    const ZERO: Self = 0.0;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// Read access to a set of channels.
pub trait ChannelSlices<T> {
    fn num_channels(&self) -> usize;

    fn channel(&self, index: usize) -> Option<&[T]>;
}

/// Write access to a set of channels.
pub trait ChannelSlicesMut<T>: ChannelSlices<T> {
    fn channel_mut(&mut self, index: usize) -> Option<&mut [T]>;
}

/// Zero channels. Stands in for absent input (instruments) or discarded output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannels;

impl<T> ChannelSlices<T> for NoChannels {
    fn num_channels(&self) -> usize {
        0
    }

    fn channel(&self, _index: usize) -> Option<&[T]> {
        None
    }
}

impl<T> ChannelSlicesMut<T> for NoChannels {
    fn channel_mut(&mut self, _index: usize) -> Option<&mut [T]> {
        None
    }
}

macro_rules! impl_shared_channels {
    ($($ty:ty),* $(,)?) => {$(
        impl<'s, T> ChannelSlices<T> for $ty {
            #[inline]
            fn num_channels(&self) -> usize {
                self.len()
            }

            #[inline]
            fn channel(&self, index: usize) -> Option<&[T]> {
                self.get(index).map(|ch| &ch[..])
            }
        }
    )*};
}

impl_shared_channels!(&'s [&'s [T]], Vec<&'s [T]>, &'s [Vec<T>], Vec<Vec<T>>);

impl<'s, T, const N: usize> ChannelSlices<T> for [&'s [T]; N] {
    #[inline]
    fn num_channels(&self) -> usize {
        N
    }

    #[inline]
    fn channel(&self, index: usize) -> Option<&[T]> {
        self.get(index).copied()
    }
}

impl<T, const N: usize> ChannelSlices<T> for [Vec<T>; N] {
    #[inline]
    fn num_channels(&self) -> usize {
        N
    }

    #[inline]
    fn channel(&self, index: usize) -> Option<&[T]> {
        self.get(index).map(Vec::as_slice)
    }
}

macro_rules! impl_mut_channels {
    ($($ty:ty),* $(,)?) => {$(
        impl<'s, T> ChannelSlices<T> for $ty {
            #[inline]
            fn num_channels(&self) -> usize {
                self.len()
            }

            #[inline]
            fn channel(&self, index: usize) -> Option<&[T]> {
                self.get(index).map(|ch| &ch[..])
            }
        }

        impl<'s, T> ChannelSlicesMut<T> for $ty {
            #[inline]
            fn channel_mut(&mut self, index: usize) -> Option<&mut [T]> {
                self.get_mut(index).map(|ch| &mut ch[..])
            }
        }
    )*};
}

impl_mut_channels!(&'s mut [&'s mut [T]], Vec<&'s mut [T]>, &'s mut [Vec<T>]);

impl<T> ChannelSlicesMut<T> for Vec<Vec<T>> {
    #[inline]
    fn channel_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.get_mut(index).map(Vec::as_mut_slice)
    }
}

impl<'s, T, const N: usize> ChannelSlices<T> for [&'s mut [T]; N] {
    #[inline]
    fn num_channels(&self) -> usize {
        N
    }

    #[inline]
    fn channel(&self, index: usize) -> Option<&[T]> {
        self.get(index).map(|ch| &ch[..])
    }
}

impl<'s, T, const N: usize> ChannelSlicesMut<T> for [&'s mut [T]; N] {
    #[inline]
    fn channel_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.get_mut(index).map(|ch| &mut ch[..])
    }
}

impl<T, const N: usize> ChannelSlicesMut<T> for [Vec<T>; N] {
    #[inline]
    fn channel_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.get_mut(index).map(Vec::as_mut_slice)
    }
}

fn check_lengths<T, C: ChannelSlices<T> + ?Sized>(channels: &C, frames: usize) -> Result<()> {
    for index in 0..channels.num_channels() {
        let len = channels.channel(index).map_or(0, <[T]>::len);
        if len < frames {
            return Err(Error::ChannelTooShort {
                channel: index,
                len,
                frames,
            });
        }
    }
    Ok(())
}

/// Read-only window over input channels.
#[derive(Clone, Copy)]
pub struct Inputs<'a, T> {
    channels: &'a dyn ChannelSlices<T>,
    offset: usize,
    frames: usize,
}

impl<'a, T: Sample> Inputs<'a, T> {
    /// Every channel must hold at least `frames` samples.
    pub fn new(channels: &'a dyn ChannelSlices<T>, frames: usize) -> Result<Self> {
        check_lengths(channels, frames)?;
        Ok(Self {
            channels,
            offset: 0,
            frames,
        })
    }

    /// No input channels: the backend sees silence.
    pub fn silent(frames: usize) -> Self {
        Self {
            channels: &NoChannels,
            offset: 0,
            frames,
        }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.num_channels()
    }

    /// Window of channel `index`, exactly `frames()` long.
    #[inline]
    pub fn channel(&self, index: usize) -> Option<&'a [T]> {
        let channels: &'a dyn ChannelSlices<T> = self.channels;
        channels
            .channel(index)
            .and_then(|ch| ch.get(self.offset..self.offset + self.frames))
    }

    fn window(&self, start: usize, frames: usize) -> Self {
        Self {
            channels: self.channels,
            offset: self.offset + start,
            frames,
        }
    }
}

/// Writable window over output channels.
pub struct Outputs<'a, T> {
    channels: &'a mut dyn ChannelSlicesMut<T>,
    offset: usize,
    frames: usize,
}

impl<'a, T: Sample> Outputs<'a, T> {
    /// Every channel must hold at least `frames` samples.
    pub fn new(channels: &'a mut dyn ChannelSlicesMut<T>, frames: usize) -> Result<Self> {
        check_lengths(&*channels, frames)?;
        Ok(Self {
            channels,
            offset: 0,
            frames,
        })
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.num_channels()
    }

    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[T]> {
        self.channels
            .channel(index)
            .and_then(|ch| ch.get(self.offset..self.offset + self.frames))
    }

    /// Window of channel `index`, exactly `frames()` long.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [T]> {
        let range = self.offset..self.offset + self.frames;
        self.channels
            .channel_mut(index)
            .and_then(|ch| ch.get_mut(range))
    }

    pub fn fill(&mut self, value: T) {
        for index in 0..self.num_channels() {
            if let Some(ch) = self.channel_mut(index) {
                ch.fill(value);
            }
        }
    }

    /// Copy matching input channels, zero the rest.
    pub fn copy_from(&mut self, inputs: &Inputs<'_, T>) {
        for index in 0..self.num_channels() {
            let source = inputs.channel(index);
            if let Some(dest) = self.channel_mut(index) {
                match source {
                    Some(src) => {
                        let n = src.len().min(dest.len());
                        dest[..n].copy_from_slice(&src[..n]);
                        dest[n..].fill(T::ZERO);
                    }
                    None => dest.fill(T::ZERO),
                }
            }
        }
    }

    pub fn reborrow(&mut self) -> Outputs<'_, T> {
        Outputs {
            channels: &mut *self.channels,
            offset: self.offset,
            frames: self.frames,
        }
    }

    fn window(&mut self, start: usize, frames: usize) -> Outputs<'_, T> {
        Outputs {
            channels: &mut *self.channels,
            offset: self.offset + start,
            frames,
        }
    }
}

/// One call's worth of planar input and output.
///
/// ```
/// use minihost_core::AudioBlock;
///
/// let input = vec![vec![0.5f32; 64]; 2];
/// let mut output = vec![vec![0.0f32; 64]; 2];
/// let mut block = AudioBlock::new(&input, &mut output, 64).unwrap();
///
/// let tail = block.window(48, 16).unwrap();
/// assert_eq!(tail.frames(), 16);
/// ```
pub struct AudioBlock<'a, T = f32> {
    inputs: Inputs<'a, T>,
    outputs: Outputs<'a, T>,
}

impl<'a, T: Sample> AudioBlock<'a, T> {
    pub fn new(
        inputs: &'a dyn ChannelSlices<T>,
        outputs: &'a mut dyn ChannelSlicesMut<T>,
        frames: usize,
    ) -> Result<Self> {
        Ok(Self {
            inputs: Inputs::new(inputs, frames)?,
            outputs: Outputs::new(outputs, frames)?,
        })
    }

    /// Block with no input channels (instrument case).
    pub fn output_only(outputs: &'a mut dyn ChannelSlicesMut<T>, frames: usize) -> Result<Self> {
        Ok(Self {
            inputs: Inputs::silent(frames),
            outputs: Outputs::new(outputs, frames)?,
        })
    }

    /// Pair views that may point into different storage.
    pub fn from_parts(inputs: Inputs<'a, T>, outputs: Outputs<'a, T>) -> Result<Self> {
        if inputs.frames != outputs.frames {
            return Err(Error::FrameMismatch {
                inputs: inputs.frames,
                outputs: outputs.frames,
            });
        }
        Ok(Self { inputs, outputs })
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.inputs.frames
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.inputs.num_channels()
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.outputs.num_channels()
    }

    #[inline]
    pub fn input(&self, index: usize) -> Option<&[T]> {
        self.inputs.channel(index)
    }

    #[inline]
    pub fn output(&mut self, index: usize) -> Option<&mut [T]> {
        self.outputs.channel_mut(index)
    }

    #[inline]
    pub fn inputs(&self) -> Inputs<'_, T> {
        self.inputs
    }

    #[inline]
    pub fn outputs(&mut self) -> Outputs<'_, T> {
        self.outputs.reborrow()
    }

    /// Borrow both sides at once.
    #[inline]
    pub fn split(&mut self) -> (Inputs<'_, T>, Outputs<'_, T>) {
        (self.inputs, self.outputs.reborrow())
    }

    /// Zero-copy view of frames `start..start + frames`.
    ///
    /// Returns `None` if the range does not fit inside this block.
    pub fn window(&mut self, start: usize, frames: usize) -> Option<AudioBlock<'_, T>> {
        let end = start.checked_add(frames)?;
        if end > self.frames() {
            return None;
        }
        Some(AudioBlock {
            inputs: self.inputs.window(start, frames),
            outputs: self.outputs.window(start, frames),
        })
    }
}

/// Owned planar storage: `num_channels` × `capacity` samples, allocated once.
///
/// Used for chain intermediates and for the device loop's conversion buffers.
/// It can never be resized, so references handed to a backend stay valid for
/// the whole call.
#[derive(Debug, Clone)]
pub struct PlanarBuffer<T> {
    channels: Vec<Vec<T>>,
    capacity: usize,
}

impl<T: Sample> PlanarBuffer<T> {
    pub fn new(num_channels: usize, capacity: usize) -> Self {
        Self {
            channels: (0..num_channels).map(|_| vec![T::ZERO; capacity]).collect(),
            capacity,
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[T]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }

    /// Zero the first `frames` samples of every channel.
    pub fn clear(&mut self, frames: usize) {
        self.clear_channels(0..self.channels.len(), frames);
    }

    /// Zero the first `frames` samples of the channels in `range`.
    pub fn clear_channels(&mut self, range: Range<usize>, frames: usize) {
        let frames = frames.min(self.capacity);
        let end = range.end.min(self.channels.len());
        let start = range.start.min(end);
        for ch in &mut self.channels[start..end] {
            ch[..frames].fill(T::ZERO);
        }
    }

    /// First `frames` samples of every channel as an input view.
    pub fn inputs(&self, frames: usize) -> Result<Inputs<'_, T>> {
        self.check_frames(frames)?;
        Ok(Inputs {
            channels: self,
            offset: 0,
            frames,
        })
    }

    /// First `frames` samples of every channel as an output view.
    pub fn outputs(&mut self, frames: usize) -> Result<Outputs<'_, T>> {
        self.check_frames(frames)?;
        Ok(Outputs {
            channels: self,
            offset: 0,
            frames,
        })
    }

    fn check_frames(&self, frames: usize) -> Result<()> {
        if frames > self.capacity {
            return Err(Error::BlockTooLarge {
                frames,
                max: self.capacity,
            });
        }
        Ok(())
    }
}

impl<T: Sample> ChannelSlices<T> for PlanarBuffer<T> {
    #[inline]
    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    fn channel(&self, index: usize) -> Option<&[T]> {
        PlanarBuffer::channel(self, index)
    }
}

impl<T: Sample> ChannelSlicesMut<T> for PlanarBuffer<T> {
    #[inline]
    fn channel_mut(&mut self, index: usize) -> Option<&mut [T]> {
        PlanarBuffer::channel_mut(self, index)
    }
}
