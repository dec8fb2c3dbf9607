use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// One sensor data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modality {
    Color,
    Infrared,
    LongExposureInfrared,
    Depth,
    BodyIndex,
    Body,
    Audio,
    Face,
}

impl Modality {
    /// Every modality, in source-bit order.
    pub const ALL: [Modality; 8] = [
        Modality::Color,
        Modality::Infrared,
        Modality::LongExposureInfrared,
        Modality::Depth,
        Modality::BodyIndex,
        Modality::Body,
        Modality::Audio,
        Modality::Face,
    ];

    /// Modalities served by the combined multi-source reader, in extraction order.
    pub const SYNCHRONIZED: [Modality; 5] = [
        Modality::Depth,
        Modality::Infrared,
        Modality::LongExposureInfrared,
        Modality::BodyIndex,
        Modality::Body,
    ];

    pub fn bit(self) -> u32 {
        match self {
            Modality::Color => 0x01,
            Modality::Infrared => 0x02,
            Modality::LongExposureInfrared => 0x04,
            Modality::Depth => 0x08,
            Modality::BodyIndex => 0x10,
            Modality::Body => 0x20,
            Modality::Audio => 0x40,
            Modality::Face => 0x80,
        }
    }

    /// File and folder prefix used on disk.
    pub fn prefix(self) -> &'static str {
        match self {
            Modality::Color => "video",
            Modality::Infrared => "infrared",
            Modality::LongExposureInfrared => "longexp_infrared",
            Modality::Depth => "depth",
            Modality::BodyIndex => "body_index",
            Modality::Body => "skeleton",
            Modality::Audio => "audio",
            Modality::Face => "face",
        }
    }

    /// Frame-type tag written to the `.desc` record.
    pub fn frame_type(self) -> &'static str {
        match self {
            Modality::Color => "YUY2",
            Modality::Infrared | Modality::LongExposureInfrared | Modality::Depth => "UINT16",
            Modality::BodyIndex => "UINT8",
            Modality::Body => "BodyRecord",
            Modality::Audio => "AudioSample",
            Modality::Face => "FaceRecord",
        }
    }

    /// Pixel format reported to frame listeners.
    pub fn image_format(self) -> ImageFormat {
        match self {
            Modality::Color => ImageFormat::Yuy2,
            Modality::Infrared | Modality::LongExposureInfrared | Modality::Depth => ImageFormat::Uint16,
            Modality::BodyIndex => ImageFormat::Uint8,
            Modality::Audio => ImageFormat::Float32Samples,
            Modality::Body | Modality::Face => ImageFormat::Unknown,
        }
    }

    /// Worst-case image payload in bytes, for image modalities.
    pub fn max_image_bytes(self) -> Option<usize> {
        match self {
            Modality::Color => Some(COLOR_WIDTH * COLOR_HEIGHT * COLOR_BYTES_PER_PIXEL),
            Modality::Infrared | Modality::LongExposureInfrared | Modality::Depth => {
                Some(DEPTH_WIDTH * DEPTH_HEIGHT * 2)
            }
            Modality::BodyIndex => Some(DEPTH_WIDTH * DEPTH_HEIGHT),
            Modality::Body | Modality::Face | Modality::Audio => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

pub const COLOR_WIDTH: usize = 1920;
pub const COLOR_HEIGHT: usize = 1080;
/// YUY2 packs two pixels in 32 bits.
pub const COLOR_BYTES_PER_PIXEL: usize = 2;
pub const DEPTH_WIDTH: usize = 512;
pub const DEPTH_HEIGHT: usize = 424;

/// Pixel/sample format tag passed to frame listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Unknown,
    Yuy2,
    Uint16,
    Uint8,
    Float32Samples,
}

/// Bitmask of requested sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceSet(u32);

impl SourceSet {
    pub const NONE: SourceSet = SourceSet(0);
    pub const COLOR: SourceSet = SourceSet(0x01);
    pub const INFRARED: SourceSet = SourceSet(0x02);
    pub const LONG_EXPOSURE_INFRARED: SourceSet = SourceSet(0x04);
    pub const DEPTH: SourceSet = SourceSet(0x08);
    pub const BODY_INDEX: SourceSet = SourceSet(0x10);
    pub const BODY: SourceSet = SourceSet(0x20);
    pub const AUDIO: SourceSet = SourceSet(0x40);
    pub const FACE: SourceSet = SourceSet(0x80);
    pub const ALL: SourceSet = SourceSet(0xff);

    /// Build from raw bits, dropping unknown ones.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, modality: Modality) -> bool {
        self.0 & modality.bit() != 0
    }

    pub fn insert(&mut self, modality: Modality) {
        self.0 |= modality.bit();
    }

    pub fn remove(&mut self, modality: Modality) {
        self.0 &= !modality.bit();
    }

    /// Face lookup is keyed by body tracking id, so face implies body.
    pub fn with_implied(self) -> Self {
        let mut expanded = self;
        if expanded.contains(Modality::Face) {
            expanded.insert(Modality::Body);
        }
        expanded
    }

    /// The subset the combined reader can serve.
    pub fn synchronized(self) -> Self {
        let mut subset = SourceSet::NONE;
        for modality in Modality::SYNCHRONIZED {
            if self.contains(modality) {
                subset.insert(modality);
            }
        }
        subset
    }

    pub fn iter(self) -> impl Iterator<Item = Modality> {
        Modality::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl From<Modality> for SourceSet {
    fn from(modality: Modality) -> Self {
        SourceSet(modality.bit())
    }
}

impl BitOr for SourceSet {
    type Output = SourceSet;

    fn bitor(self, rhs: SourceSet) -> SourceSet {
        SourceSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for SourceSet {
    fn bitor_assign(&mut self, rhs: SourceSet) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Modality::prefix).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}
