//! The main dictionary: `main_dict.ascii`, the sorted token -> payload file
//! every query ultimately reads from.

pub mod codec;
pub mod dictionary;
pub mod payload;

pub use dictionary::{MainDictionaryMmap, MainDictionaryReader, MainDictionaryWriter};
pub use payload::{Payload, PackageId, Position, Token};
