use super::{le_i32, le_u16, le_u32, put, slice, u8_at, Metadata};

pub(super) fn extract(data: &[u8], extension: &str, meta: &mut Metadata) {
    match extension {
        "mp3" => mp3(data, meta),
        "wav" => wav(data, meta),
        "ogg" => ogg(data, meta),
        _ => None,
    };
}

// ============================================================================
// MPEG AUDIO
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MpegVersion {
    V1,
    V2,
    V25,
}

impl MpegVersion {
    fn from_bits(bits: u8) -> Option<MpegVersion> {
        match bits {
            0b00 => Some(MpegVersion::V25),
            0b10 => Some(MpegVersion::V2),
            0b11 => Some(MpegVersion::V1),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            MpegVersion::V1 => "MPEG-1",
            MpegVersion::V2 => "MPEG-2",
            MpegVersion::V25 => "MPEG-2.5",
        }
    }
}

/// Kbps, index 0 is "free format".
#[rustfmt::skip]
const BITRATES_V1_L1: [u16; 15] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
#[rustfmt::skip]
const BITRATES_V1_L2: [u16; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
/// Carries a value for index 15 as well.
#[rustfmt::skip]
const BITRATES_V1_L3: [u16; 16] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
#[rustfmt::skip]
const BITRATES_V2_L1: [u16; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
#[rustfmt::skip]
const BITRATES_V2_L23: [u16; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_V25: [u32; 3] = [11025, 12000, 8000];

const CHANNEL_MODES: [&str; 4] = ["stereo", "joint_stereo", "dual_channel", "mono"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    version: MpegVersion,
    layer: u8,
    bitrate: u16,
    sample_rate: u32,
    padding: bool,
    channel_mode: u8,
}

impl FrameHeader {
    fn parse(header: &[u8]) -> Option<FrameHeader> {
        let &[b0, b1, b2, b3] = header else {
            return None;
        };
        if b0 != 0xFF || b1 & 0xE0 != 0xE0 {
            return None;
        }

        let version = MpegVersion::from_bits((b1 >> 3) & 0b11)?;
        let layer = match (b1 >> 1) & 0b11 {
            0b11 => 1,
            0b10 => 2,
            0b01 => 3,
            _ => return None,
        };

        let bitrate_index = (b2 >> 4) as usize;
        let table: &[u16] = match (version, layer) {
            (MpegVersion::V1, 1) => &BITRATES_V1_L1,
            (MpegVersion::V1, 2) => &BITRATES_V1_L2,
            (MpegVersion::V1, _) => &BITRATES_V1_L3,
            (_, 1) => &BITRATES_V2_L1,
            _ => &BITRATES_V2_L23,
        };
        let bitrate = *table.get(bitrate_index)?;

        let rates = match version {
            MpegVersion::V1 => &SAMPLE_RATES_V1,
            MpegVersion::V2 => &SAMPLE_RATES_V2,
            MpegVersion::V25 => &SAMPLE_RATES_V25,
        };
        let sample_rate = *rates.get(((b2 >> 2) & 0b11) as usize)?;

        Some(FrameHeader {
            version,
            layer,
            bitrate,
            sample_rate,
            padding: (b2 >> 1) & 1 == 1,
            channel_mode: b3 >> 6,
        })
    }
}

/// Decodes a 28-bit syncsafe integer (7 bits per byte).
fn syncsafe(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, b| (acc << 7) | (*b & 0x7F) as u32)
}

fn mp3(data: &[u8], meta: &mut Metadata) -> Option<()> {
    let mut start = 0usize;

    if data.starts_with(b"ID3") {
        let size = syncsafe(slice(data, 6, 4)?) as usize;
        put(meta, "id3_version", format!("2.{}", u8_at(data, 3)?));
        put(meta, "id3_size", size);
        start = size + 10;
    }

    let tail = data.get(start..)?;
    let (offset, header) = tail
        .windows(4)
        .enumerate()
        .find_map(|(i, w)| Some((i, FrameHeader::parse(w)?)))?;
    let frame_start = start + offset;

    put(meta, "version", header.version.as_str());
    put(meta, "layer", header.layer);
    put(meta, "bitrate", header.bitrate);
    put(meta, "sample_rate", header.sample_rate);
    put(meta, "padding", header.padding);
    put(meta, "channel_mode", CHANNEL_MODES[header.channel_mode as usize]);
    put(meta, "channels", if header.channel_mode == 3 { 1 } else { 2 });

    if header.bitrate > 0 {
        let audio_bytes = (data.len() - frame_start) as f64;
        let duration = audio_bytes * 8.0 / (header.bitrate as f64 * 1000.0);
        put(meta, "duration", round3(duration));
    }

    Some(())
}

// ============================================================================
// RIFF WAVE
// ============================================================================

fn wav(data: &[u8], meta: &mut Metadata) -> Option<()> {
    if slice(data, 0, 4)? != b"RIFF" || slice(data, 8, 4)? != b"WAVE" {
        return None;
    }

    put(meta, "audio_format", le_u16(data, 20)?);
    put(meta, "channels", le_u16(data, 22)?);
    put(meta, "sample_rate", le_u32(data, 24)?);
    let byte_rate = le_u32(data, 28)?;
    put(meta, "byte_rate", byte_rate);
    put(meta, "block_align", le_u16(data, 32)?);
    put(meta, "bit_depth", le_u16(data, 34)?);

    let data_size = riff_chunk_size(data, b"data")?;
    put(meta, "data_size", data_size);
    if byte_rate > 0 {
        put(meta, "duration", round3(data_size as f64 / byte_rate as f64));
    }

    Some(())
}

/// Walks RIFF chunks after the form type and returns the declared size of `id`.
fn riff_chunk_size(data: &[u8], id: &[u8; 4]) -> Option<u32> {
    let mut pos = 12usize;
    loop {
        let chunk_id = slice(data, pos, 4)?;
        let size = le_u32(data, pos + 4)?;
        if chunk_id == id {
            return Some(size);
        }
        // Chunks are padded to an even length.
        pos = pos.checked_add(8 + size as usize + (size as usize & 1))?;
    }
}

// ============================================================================
// OGG VORBIS
// ============================================================================

/// Offset of the Vorbis identification packet in a single-segment first page.
const VORBIS_ID: usize = 28;

fn ogg(data: &[u8], meta: &mut Metadata) -> Option<()> {
    if slice(data, 0, 4)? != b"OggS" {
        return None;
    }

    if slice(data, VORBIS_ID, 7)? == b"\x01vorbis" {
        put(meta, "codec", "vorbis");
    }
    put(meta, "version", le_u32(data, VORBIS_ID + 7)?);
    put(meta, "channels", u8_at(data, VORBIS_ID + 11)?);
    put(meta, "sample_rate", le_u32(data, VORBIS_ID + 12)?);
    put(meta, "bitrate_maximum", le_i32(data, VORBIS_ID + 16)?);
    put(meta, "bitrate_nominal", le_i32(data, VORBIS_ID + 20)?);
    put(meta, "bitrate_minimum", le_i32(data, VORBIS_ID + 24)?);

    Some(())
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
