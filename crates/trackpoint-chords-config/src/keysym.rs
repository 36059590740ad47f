//! Keysym name table
//!
//! Only keysyms that make sense as a held modifier are listed. Anything else
//! can still be given as a hex literal.

const KEYSYMS: &[(&str, u32)] = &[
    ("Shift_L", 0xffe1),
    ("Shift_R", 0xffe2),
    ("Control_L", 0xffe3),
    ("Control_R", 0xffe4),
    ("Caps_Lock", 0xffe5),
    ("Meta_L", 0xffe7),
    ("Meta_R", 0xffe8),
    ("Alt_L", 0xffe9),
    ("Alt_R", 0xffea),
    ("Super_L", 0xffeb),
    ("Super_R", 0xffec),
    ("Hyper_L", 0xffed),
    ("Hyper_R", 0xffee),
    ("Mode_switch", 0xff7e),
    ("ISO_Level3_Shift", 0xfe03),
    ("ISO_Level5_Shift", 0xfe11),
];

/// Resolve a keysym name (case-sensitive, as in `xmodmap`) or a `0x` hex literal.
pub fn keysym_from_name(name: &str) -> Option<u32> {
    if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok().filter(|v| *v != 0);
    }

    KEYSYMS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, value)| *value)
}
