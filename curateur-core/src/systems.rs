//! Provider system ID table.
//!
//! System IDs are Provider-specific and live here rather than on the
//! platform index, as they're a third-party API detail.

/// Map a frontend platform identifier to its Provider system ID.
pub fn provider_system_id(platform_name: &str) -> Option<u32> {
    match platform_name {
        // Nintendo
        "nes" | "famicom" => Some(3),
        "snes" | "sfc" => Some(4),
        "n64" => Some(14),
        "gc" => Some(13),
        "wii" => Some(16),
        "wiiu" => Some(18),
        "gb" => Some(9),
        "gbc" => Some(10),
        "gba" => Some(12),
        "nds" => Some(15),
        "n3ds" => Some(17),
        "virtualboy" => Some(11),

        // Sony
        "psx" => Some(57),
        "ps2" => Some(58),
        "ps3" => Some(59),
        "psp" => Some(61),
        "psvita" => Some(62),

        // Sega
        "sg-1000" => Some(109),
        "mastersystem" => Some(2),
        "genesis" | "megadrive" => Some(1),
        "segacd" | "megacd" => Some(20),
        "sega32x" => Some(19),
        "saturn" => Some(22),
        "dreamcast" => Some(23),
        "gamegear" => Some(21),

        // Microsoft
        "xbox" => Some(32),
        "xbox360" => Some(33),

        // NEC / SNK / Atari
        "pcengine" | "tg16" => Some(31),
        "pcenginecd" | "tg-cd" => Some(114),
        "neogeo" => Some(142),
        "ngp" => Some(25),
        "ngpc" => Some(82),
        "atari2600" => Some(26),
        "atari7800" => Some(41),
        "lynx" => Some(28),
        "jaguar" => Some(27),

        // Other handhelds / computers
        "wonderswan" => Some(45),
        "wonderswancolor" => Some(46),
        "amiga" => Some(64),
        "c64" => Some(66),
        "atarist" => Some(42),
        "dos" | "pc" => Some(135),

        _ => None,
    }
}
