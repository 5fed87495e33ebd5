use std::borrow::Cow;

/// Raw 90 kHz clock value as stored in a segment header.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub const TICKS_PER_MILLI: f64 = 90.0;

    pub fn ticks(self) -> u32 {
        self.0
    }

    pub fn millis(self) -> f64 {
        self.0 as f64 / Self::TICKS_PER_MILLI
    }
}

impl From<u32> for Timestamp {
    fn from(ticks: u32) -> Timestamp {
        Timestamp(ticks)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SegmentType {
    PaletteDefinition,
    ObjectDefinition,
    PresentationComposition,
    WindowDefinition,
    End,
}

impl SegmentType {
    pub fn from_tag(tag: u8) -> Option<SegmentType> {
        match tag {
            0x14 => Some(SegmentType::PaletteDefinition),
            0x15 => Some(SegmentType::ObjectDefinition),
            0x16 => Some(SegmentType::PresentationComposition),
            0x17 => Some(SegmentType::WindowDefinition),
            0x80 => Some(SegmentType::End),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            SegmentType::PaletteDefinition => 0x14,
            SegmentType::ObjectDefinition => 0x15,
            SegmentType::PresentationComposition => 0x16,
            SegmentType::WindowDefinition => 0x17,
            SegmentType::End => 0x80,
        }
    }
}

/// One record of the stream: the 13 byte header plus its decoded payload.
#[derive(Debug, PartialEq, Clone)]
pub struct Packet {
    /// Stored as read; a well-formed stream always carries `PG` here.
    pub magic: [u8; 2],
    pub pts: Timestamp,
    /// Always zero in conforming streams, not enforced.
    pub dts: Timestamp,
    pub payload_size: u16,
    pub segment: Segment,
}

impl Packet {
    pub const HEADER_SIZE: usize = 13;
    pub const MAGIC: [u8; 2] = *b"PG";

    pub fn magic_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.magic)
    }

    pub fn segment_type(&self) -> SegmentType {
        self.segment.segment_type()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Segment {
    PresentationComposition(PresentationComposition),
    WindowDefinition(WindowDefinitionSet),
    PaletteDefinition(PaletteDefinition),
    ObjectDefinition(ObjectDefinition),
    End,
}

impl Segment {
    pub fn segment_type(&self) -> SegmentType {
        match self {
            Segment::PresentationComposition(_) => SegmentType::PresentationComposition,
            Segment::WindowDefinition(_) => SegmentType::WindowDefinition,
            Segment::PaletteDefinition(_) => SegmentType::PaletteDefinition,
            Segment::ObjectDefinition(_) => SegmentType::ObjectDefinition,
            Segment::End => SegmentType::End,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CompositionState {
    Normal,
    AcquisitionPoint,
    EpochStart,
}

impl CompositionState {
    pub fn from_byte(b: u8) -> Option<CompositionState> {
        match b {
            0x00 => Some(CompositionState::Normal),
            0x40 => Some(CompositionState::AcquisitionPoint),
            0x80 => Some(CompositionState::EpochStart),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct PresentationComposition {
    pub width: u16,
    pub height: u16,
    pub framerate: u8,
    /// Shared by the display sets that show and clear one subtitle.
    pub number: u16,
    pub state: CompositionState,
    pub palette_update: bool,
    pub palette_id: u8,
    pub object_count: u8,
    pub objects: Vec<CompositionObject>,
}

impl PresentationComposition {
    fn first_object(&self) -> Option<&CompositionObject> {
        self.objects.first()
    }

    pub fn object_id(&self) -> Option<u16> {
        self.first_object().map(|o| o.id)
    }

    pub fn window_id(&self) -> Option<u8> {
        self.first_object().map(|o| o.window_id)
    }

    pub fn object_cropped(&self) -> Option<bool> {
        self.first_object().map(|o| o.crop != CompositionObjectCrop::NotCropped)
    }

    pub fn position(&self) -> Option<(u16, u16)> {
        self.first_object().map(|o| (o.x, o.y))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositionObject {
    pub id: u16,
    pub window_id: u8,
    pub x: u16,
    pub y: u16,
    pub crop: CompositionObjectCrop,
}

#[derive(Debug, PartialEq, Clone)]
pub enum CompositionObjectCrop {
    NotCropped,
    Cropped {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub struct WindowDefinitionSet {
    pub count: u8,
    pub windows: Vec<WindowDefinition>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct WindowDefinition {
    pub id: u8,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PaletteDefinition {
    pub id: u8,
    pub version: u8,
    pub entries: Vec<PaletteEntry>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PaletteEntry {
    pub id: u8,
    pub color: YCrCbAColor,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct YCrCbAColor {
    pub y: u8,
    pub cr: u8,
    pub cb: u8,
    pub a: u8,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SequenceFlag {
    Last,
    First,
    FirstAndLast,
}

impl SequenceFlag {
    pub fn from_byte(b: u8) -> Option<SequenceFlag> {
        match b {
            0x40 => Some(SequenceFlag::Last),
            0x80 => Some(SequenceFlag::First),
            0xC0 => Some(SequenceFlag::FirstAndLast),
            _ => None,
        }
    }

    pub fn is_first(self) -> bool {
        self != SequenceFlag::Last
    }

    pub fn is_last(self) -> bool {
        self != SequenceFlag::First
    }
}

#[derive(Derivative, PartialEq, Clone)]
#[derivative(Debug)]
pub struct ObjectDefinition {
    pub id: u16,
    pub version: u8,
    pub sequence: SequenceFlag,
    pub data_length: u32,
    /// Informational only; the decoded bitmap derives its own size.
    pub width: u16,
    pub height: u16,
    #[derivative(Debug = "ignore")]
    pub data: Vec<u8>,
}
