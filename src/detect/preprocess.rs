use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::tract_ndarray::Array4;

use crate::model::{ChannelOrder, InputTensor, ModelSpec};

/// Converts frames into the network's input tensor.
///
/// Resizes to a fixed square without cropping, orders channels for the
/// network, scales to [0, 1] and adds the batch axis. Frames are RGB in
/// memory, so an RGB-trained network gets channels as-is and a BGR-trained
/// one gets them reversed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Preprocessor {
    size: u32,
    channel_order: ChannelOrder,
}

impl Preprocessor {
    pub fn new(size: u32, channel_order: ChannelOrder) -> Self {
        Self {
            size,
            channel_order,
        }
    }

    pub fn for_model(spec: &ModelSpec) -> Self {
        Self::new(spec.input_size, spec.channel_order)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn run(&self, image: &RgbImage) -> InputTensor {
        let size = self.size as usize;
        let resized;
        let source = if image.dimensions() == (self.size, self.size) {
            image
        } else {
            resized = imageops::resize(image, self.size, self.size, FilterType::Triangle);
            &resized
        };

        let order: [usize; 3] = match self.channel_order {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        };

        Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            let pixel = source.get_pixel(x as u32, y as u32);
            pixel.0[order[channel]] as f32 / 255.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn produces_batched_square_tensor() {
        let image = RgbImage::from_pixel(640, 480, Rgb([255, 0, 0]));
        let tensor = Preprocessor::new(320, ChannelOrder::Rgb).run(&image);

        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);
        assert!((tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 10, 10]], 0.0);
        assert_eq!(tensor[[0, 2, 10, 10]], 0.0);
    }

    #[test]
    fn bgr_models_get_reversed_channels() {
        let image = RgbImage::from_pixel(320, 320, Rgb([255, 0, 51]));
        let tensor = Preprocessor::new(320, ChannelOrder::Bgr).run(&image);

        assert!((tensor[[0, 0, 0, 0]] - 0.2).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn same_input_same_tensor() {
        let image = RgbImage::from_fn(97, 53, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 7]));
        let pre = Preprocessor::new(320, ChannelOrder::Rgb);
        assert_eq!(pre.run(&image), pre.run(&image));
    }

    #[test]
    fn model_spec_sets_input_size() {
        let spec = ModelSpec {
            input_size: 416,
            ..ModelSpec::default()
        };
        assert_eq!(Preprocessor::for_model(&spec).size(), 416);
        assert_eq!(Preprocessor::for_model(&ModelSpec::default()).size(), 320);
    }
}
