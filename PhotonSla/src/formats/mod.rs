//! File format handlers
//!
//! Only the Photon / cbddlp family is supported.

pub mod photon;

pub use photon::{
    CompactLayer, MachineInfo, PhotonFile, PhotonFileBuilder, PhotonHeader, PreviewImage,
    PrintParameters, SectionOffsets,
};
