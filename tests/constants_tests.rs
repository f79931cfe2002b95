// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use isp_pipeline::constants::{self, RAW_BAYER_CODES, entities, pads};
use isp_pipeline::media::MediaBusCode;

#[test]
fn test_bayer_codes_are_unique() {
    for (i, a) in RAW_BAYER_CODES.iter().enumerate() {
        for b in &RAW_BAYER_CODES[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_bayer_codes_descend_in_depth() {
    let depths: Vec<u32> = RAW_BAYER_CODES
        .iter()
        .map(|code| code.bit_depth().unwrap())
        .collect();
    assert!(depths.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(RAW_BAYER_CODES[0], MediaBusCode::SBGGR12_1X12);
    assert_eq!(RAW_BAYER_CODES[11], MediaBusCode::SRGGB8_1X8);
}

#[test]
fn test_prefixed_name_is_accepted() {
    assert_eq!(
        MediaBusCode::from_name("MEDIA_BUS_FMT_SGRBG10_1X10"),
        Some(MediaBusCode::SGRBG10_1X10)
    );
    assert_eq!(MediaBusCode::from_name("UYVY8_1X16"), None);
}

#[test]
fn test_chain_pads() {
    // The receiver feeds the ISP sink, the ISP source feeds the main path
    assert_ne!(pads::RECEIVER_SINK, pads::RECEIVER_SOURCE);
    assert_eq!(pads::ISP_SINK, 0);
    assert_eq!(pads::ISP_SOURCE, 2);
    assert_eq!(entities::CAPTURE, "rkisp1_mainpath");
}

#[test]
fn test_version_is_stamped() {
    assert!(!constants::app_info::version().is_empty());
}
