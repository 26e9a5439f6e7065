use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use common::Buffer2;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::decoder::ifd::Value;
use tiff::tags::Tag;

use super::{BitDepth, Calibration, Hyperstack};
use crate::error::{Error, Result};

/// Hyperstack layout stored by ImageJ in the first page's `ImageDescription`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageJDescription {
    pub images: Option<usize>,
    pub channels: Option<usize>,
    pub slices: Option<usize>,
    pub frames: Option<usize>,
    pub unit: Option<String>,
}

impl ImageJDescription {
    fn layout_for(&self, page_count: usize) -> Option<(usize, usize, usize)> {
        if self.channels.is_none() && self.slices.is_none() && self.frames.is_none() {
            return None;
        }
        let layout = (
            self.channels.unwrap_or(1),
            self.slices.unwrap_or(1),
            self.frames.unwrap_or(1),
        );
        (layout.0 * layout.1 * layout.2 == page_count).then_some(layout)
    }
}

pub fn parse_imagej_description(text: &str) -> ImageJDescription {
    let mut desc = ImageJDescription::default();
    for line in text.lines() {
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let value = raw_value.trim().parse::<usize>().ok();
        match key.trim() {
            "unit" => desc.unit = Some(raw_value.trim().replace("\\u00B5", "\u{b5}")),
            "images" => desc.images = value,
            "channels" => desc.channels = value,
            "slices" => desc.slices = value,
            "frames" => desc.frames = value,
            _ => {}
        }
    }
    desc
}

/// Loads a multi-page 8/16-bit grayscale TIFF.
///
/// The hyperstack layout comes from the ImageJ description when it matches
/// the page count, then from `layout` (`c, z, t`), and otherwise every page is
/// treated as a slice.
pub fn load_stack(path: &Path, layout: Option<(usize, usize, usize)>) -> Result<Hyperstack> {
    let mut decoder =
        Decoder::new(BufReader::new(File::open(path)?))?.with_limits(Limits::unlimited());

    let description = decoder
        .get_tag_ascii_string(Tag::ImageDescription)
        .map(|text| parse_imagej_description(&text))
        .unwrap_or_default();
    let calibration = description.unit.as_ref().map(|unit| {
        let pixel_width = pixel_size(&mut decoder, Tag::XResolution).unwrap_or(1.0);
        let pixel_height = pixel_size(&mut decoder, Tag::YResolution).unwrap_or(pixel_width);
        Calibration::new(pixel_width, pixel_height, unit.clone())
    });

    let bit_depth = match decoder.colortype()? {
        tiff::ColorType::Gray(8) => BitDepth::Eight,
        tiff::ColorType::Gray(16) => BitDepth::Sixteen,
        other => {
            return Err(Error::InputValidation(format!(
                "8-bit or 16-bit grayscale stack required, got {:?}",
                other
            )))
        }
    };

    let mut planes = Vec::new();
    loop {
        let (width, height) = decoder.dimensions()?;
        let pixels: Vec<u16> = match decoder.read_image()? {
            DecodingResult::U8(buf) if bit_depth == BitDepth::Eight => {
                buf.into_iter().map(u16::from).collect()
            }
            DecodingResult::U16(buf) if bit_depth == BitDepth::Sixteen => buf,
            _ => {
                return Err(Error::InputValidation(format!(
                    "page {} of {} has a different sample type",
                    planes.len() + 1,
                    path.display()
                )))
            }
        };
        planes.push(Buffer2::new(width as usize, height as usize, pixels));

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    let page_count = planes.len();
    let (channels, slices, frames) = description
        .layout_for(page_count)
        .or(layout.filter(|(c, z, t)| c * z * t == page_count))
        .unwrap_or((1, page_count, 1));

    let title = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    log::debug!(
        "Loaded {} ({} pages, c={} z={} t={}, {:?})",
        title,
        page_count,
        channels,
        slices,
        frames,
        bit_depth
    );

    let stack = Hyperstack::new(title, channels, slices, frames, bit_depth, planes)?;
    Ok(match calibration {
        Some(calibration) => stack.with_calibration(calibration),
        None => stack,
    })
}

/// Pixel size from a resolution tag (pixels per unit).
fn pixel_size<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<f64> {
    match decoder.find_tag(tag).ok().flatten()? {
        Value::Rational(num, denom) if num > 0 && denom > 0 => Some(denom as f64 / num as f64),
        _ => None,
    }
}

/// Writes RGB planes as a multi-page 8-bit TIFF.
pub fn save_rgb_stack(path: &Path, planes: &[Buffer2<[u8; 3]>]) -> Result<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    for plane in planes {
        let bytes: Vec<u8> = plane.iter().flat_map(|rgb| rgb.iter().copied()).collect();
        encoder.write_image::<colortype::RGB8>(plane.width() as u32, plane.height() as u32, &bytes)?;
    }
    Ok(())
}
