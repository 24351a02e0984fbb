#![allow(dead_code)]

use std::io::{Cursor, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use formula_pwrecover::{derive_key, EncryptionParams, HashAlgorithm};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const SALT: [u8; 16] = [
    0x3A, 0x91, 0x0C, 0x5E, 0xD2, 0x47, 0x8B, 0x16, 0xF0, 0x29, 0x6D, 0xA4, 0x18, 0xC3, 0x75, 0xBE,
];

/// Parameters protecting `password`. Tests use a spin count of 1 so large candidate spaces stay
/// quick to search.
pub fn params_for(password: &str, algorithm: HashAlgorithm, hash_name: &str) -> EncryptionParams {
    let fingerprint = derive_key(password, &SALT, 1, algorithm)
        .expect("derive fingerprint")
        .to_vec();
    EncryptionParams {
        spin_count: 1,
        salt: SALT.to_vec(),
        fingerprint,
        hash_algorithm: hash_name.to_string(),
    }
}

pub fn encryption_info_xml(params: &EncryptionParams) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<encryption xmlns="http://schemas.microsoft.com/office/2006/encryption">
  <keyData spinCount="{}" saltValue="{}" hashValue="{}" hashAlgorithm="{}"/>
</encryption>"#,
        params.spin_count,
        STANDARD.encode(&params.salt),
        STANDARD.encode(&params.fingerprint),
        params.hash_algorithm,
    )
}

/// Build a ZIP container from `(entry name, contents)` pairs.
pub fn build_container(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(*name, options).expect("start zip entry");
        zip.write_all(contents).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

/// A protected container with the usual workbook parts alongside `EncryptionInfo`.
pub fn protected_container(params: &EncryptionParams) -> Vec<u8> {
    let xml = encryption_info_xml(params);
    build_container(&[
        ("[Content_Types].xml", b"<Types/>"),
        ("xl/workbook.xml", b"<workbook/>"),
        ("EncryptionInfo", xml.as_bytes()),
    ])
}

pub fn plain_container() -> Vec<u8> {
    build_container(&[
        ("[Content_Types].xml", b"<Types/>"),
        ("xl/workbook.xml", b"<workbook/>"),
    ])
}
