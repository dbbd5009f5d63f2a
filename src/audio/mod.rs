//! Audio buffers, decoding, format conversion, remote download and WAV output.
//!
//! Everything here works on fully decoded PCM held in memory; inputs are
//! spoken-word recordings and short music clips, so streaming is not needed.

mod buffer;
mod convert;
mod decode;
mod downloader;
mod validate;
mod wav;

pub use buffer::{db_to_linear, ms_to_frames, AudioBuffer};
pub use convert::{conform, convert_channels, resample};
pub use decode::{decode_file, probe_file, AudioInfo};
pub use downloader::{download_audio, RemoteAudio};
pub use validate::{
    extension_of, is_supported_extension, supported_formats, validate_audio_file,
    validate_file_extension, validate_file_size, SUPPORTED_EXTENSIONS,
};
pub use wav::write_wav;
