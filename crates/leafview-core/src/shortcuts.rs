//! Keyboard shortcut matching against config strings such as `ctrl+=`.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub logo: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        logo: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        alt: false,
        shift: false,
        logo: false,
    };

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// A key press as reported by the host, e.g. `KeyPress::new("0", Modifiers::CTRL)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }
}

pub fn normalize_shortcut_token(raw: &str, fallback: &str) -> String {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        fallback.to_string()
    } else {
        normalized.replace("spacebar", "space")
    }
}

fn normalize_key(key: &str) -> String {
    match key.trim().to_ascii_lowercase().as_str() {
        "+" | "plus" | "equal" => "=".to_string(),
        "minus" | "_" => "-".to_string(),
        " " | "spacebar" => "space".to_string(),
        other => other.to_string(),
    }
}

/// Shift only has to match when the shortcut names it, since producing `+` or `_`
/// already needs shift on most layouts.
pub fn shortcut_matches(raw: &str, fallback: &str, press: &KeyPress) -> bool {
    let normalized = normalize_shortcut_token(raw, fallback);

    let mut required_ctrl = false;
    let mut required_alt = false;
    let mut required_logo = false;
    let mut required_shift = false;
    let mut required_key: Option<&str> = None;

    // `ctrl++` splits into empty tokens; the trailing `+` is the key itself.
    let plus_key = normalized.ends_with("++") || normalized == "+";
    for token in normalized
        .split('+')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        match token {
            "ctrl" | "control" => required_ctrl = true,
            "alt" => required_alt = true,
            "logo" | "meta" | "super" | "cmd" | "command" => required_logo = true,
            "shift" => required_shift = true,
            key => required_key = Some(key),
        }
    }

    let required_key = if plus_key {
        "=".to_string()
    } else if let Some(key) = required_key {
        normalize_key(key)
    } else {
        // A binding made only of modifiers falls back to the default shortcut.
        return normalize_shortcut_token(fallback, "") != normalized
            && shortcut_matches(fallback, "", press);
    };
    if normalize_key(&press.key) != required_key {
        return false;
    }

    let modifiers = press.modifiers;
    modifiers.ctrl == required_ctrl
        && modifiers.alt == required_alt
        && modifiers.logo == required_logo
        && (!required_shift || modifiers.shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_spacebar_alias() {
        assert_eq!(normalize_shortcut_token(" SpaceBar ", "x"), "space");
    }

    #[test]
    fn plus_and_equals_are_the_same_key() {
        let press = KeyPress::new("+", Modifiers::CTRL.with_shift());
        assert!(shortcut_matches("ctrl+=", "x", &press));
        assert!(shortcut_matches("ctrl++", "x", &KeyPress::new("=", Modifiers::CTRL)));
    }

    #[test]
    fn rejects_missing_or_extra_modifier() {
        assert!(!shortcut_matches("ctrl+0", "x", &KeyPress::new("0", Modifiers::NONE)));
        let alt = Modifiers {
            alt: true,
            ..Modifiers::CTRL
        };
        assert!(!shortcut_matches("ctrl+0", "x", &KeyPress::new("0", alt)));
    }

    #[test]
    fn empty_binding_uses_fallback() {
        let press = KeyPress::new("0", Modifiers::CTRL);
        assert!(shortcut_matches("  ", "ctrl+0", &press));
        assert!(shortcut_matches("ctrl", "ctrl+0", &press));
        assert!(!shortcut_matches("ctrl", "", &press));
    }
}
