//! The keyword tables from spec §4.8. These are part of the wire-level
//! contract for voice control and are reproduced verbatim where literal
//! phrases are given; symmetric complements left implicit (the `light`
//! theme phrases, the generic relative-adjustment verbs) are noted as such
//! in `DESIGN.md`.

/// English disambiguation tokens searched for in the *raw*, unprocessed
/// text (spec §4.8): a matched rule is rejected if the raw text carries
/// another rule's token and none of its own.
pub const DISAMBIGUATION_VOLUME: &[&str] = &["volume", "sound"];
pub const DISAMBIGUATION_BRIGHTNESS: &[&str] = &["brightness"];
pub const DISAMBIGUATION_THEME: &[&str] = &["theme", "font", "wallpaper", "skin"];
pub const DISAMBIGUATION_DISPLAY_MODE: &[&str] = &["mode", "emoticon"];
pub const DISAMBIGUATION_SUBTITLE: &[&str] = &["subtitle"];

pub const ALL_DISAMBIGUATION_GROUPS: &[&[&str]] = &[
    DISAMBIGUATION_VOLUME,
    DISAMBIGUATION_BRIGHTNESS,
    DISAMBIGUATION_THEME,
    DISAMBIGUATION_DISPLAY_MODE,
    DISAMBIGUATION_SUBTITLE,
];

pub const VOLUME_TRIGGER: &[&str] = &["音量", "volume"];
pub const BRIGHTNESS_TRIGGER: &[&str] = &["亮度", "brightness"];
pub const THEME_TRIGGER: &[&str] = &["主题", "theme"];
pub const DISPLAY_MODE_TRIGGER: &[&str] = &["模式", "表情", "mode"];
pub const SUBTITLE_TRIGGER: &[&str] = &["字幕", "subtitle"];

pub const VOLUME_MAX: &[&str] = &["最大", "最响"];
pub const VOLUME_MIN: &[&str] = &["最小", "静音"];
pub const VOLUME_INC_10: &[&str] = &["大一点"];
pub const VOLUME_DEC_10: &[&str] = &["小一点"];

pub const BRIGHTNESS_MAX: &[&str] = &["最大", "最亮"];
pub const BRIGHTNESS_MIN: &[&str] = &["最小", "最暗"];
pub const BRIGHTNESS_INC_10: &[&str] = &["亮一点"];
pub const BRIGHTNESS_DEC_10: &[&str] = &["暗一点"];

/// Generic relative-adjustment verbs, shared by Volume and Brightness
/// (spec §4.8 names only the +10-step and max/min phrases literally).
pub const INCREASE_VERBS: &[&str] = &["调大", "增大"];
pub const DECREASE_VERBS: &[&str] = &["调小", "减小"];

pub const THEME_DARK: &[&str] = &["黑色主题", "黑夜模式", "黑色字体", "黑色字幕"];
/// Inferred complement of [`THEME_DARK`] — only the dark set is given as a
/// worked example; noted in `DESIGN.md`.
pub const THEME_LIGHT: &[&str] = &["白色主题", "白天模式", "白色字体", "白色字幕"];

pub const DISPLAY_MODE_STATIC: &[&str] = &["静态"];
pub const DISPLAY_MODE_ANIMATED: &[&str] = &["动态"];

pub const SUBTITLE_SHOW: &[&str] = &["打开", "开启", "显示"];
pub const SUBTITLE_HIDE: &[&str] = &["关闭", "隐藏", "关掉"];
