//! Cleans one line of job output for display in a status field.
//!
//! Job tools draw progress panels with box-drawing characters and colour them with terminal
//! escapes; neither survives a single-line text box.

const MAX_STATUS_CHARS: usize = 2048;

#[derive(Clone, Copy)]
enum Escape {
    Start,
    Csi,
    Osc,
    OscEsc,
    Str,
    StrEsc,
}

impl Escape {
    /// Advances through an escape sequence; `None` once it is complete.
    fn step(self, c: char) -> Option<Escape> {
        match self {
            Escape::Start => match c {
                '[' => Some(Escape::Csi),
                ']' => Some(Escape::Osc),
                'P' | 'X' | '^' | '_' => Some(Escape::Str),
                _ => None,
            },
            Escape::Csi => (!('@'..='~').contains(&c)).then_some(Escape::Csi),
            Escape::Osc => match c {
                '\x07' => None,
                '\x1b' => Some(Escape::OscEsc),
                _ => Some(Escape::Osc),
            },
            Escape::OscEsc => match c {
                '\\' => None,
                '\x1b' => Some(Escape::OscEsc),
                _ => Some(Escape::Osc),
            },
            Escape::Str => match c {
                '\x1b' => Some(Escape::StrEsc),
                _ => Some(Escape::Str),
            },
            Escape::StrEsc => match c {
                '\\' => None,
                '\x1b' => Some(Escape::StrEsc),
                _ => Some(Escape::Str),
            },
        }
    }
}

pub fn is_box_drawing(c: char) -> bool {
    ('\u{2500}'..='\u{257F}').contains(&c)
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

/// Strips box-drawing characters (U+2500..=U+257F), terminal escape sequences and control
/// characters, then trims surrounding whitespace. Tabs become single spaces.
pub fn decorate(line: &str) -> String {
    let mut out = String::with_capacity(line.len().min(MAX_STATUS_CHARS));
    let mut escape: Option<Escape> = None;
    let mut kept = 0usize;

    for c in line.chars() {
        if let Some(state) = escape {
            escape = state.step(c);
            continue;
        }
        match c {
            '\x1b' => {
                escape = Some(Escape::Start);
                continue;
            }
            '\t' => out.push(' '),
            c if c.is_control() || is_bidi_control(c) || is_box_drawing(c) => continue,
            c => out.push(c),
        }
        kept += 1;
        if kept >= MAX_STATUS_CHARS {
            out.push_str(" ...");
            break;
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::decorate;

    #[test]
    fn strips_box_drawing_and_trims() {
        assert_eq!(decorate("│ Step 100 │"), "Step 100");
        assert_eq!(decorate("╭──────╮"), "");
        assert_eq!(decorate("  ┃ loading ┃  "), "loading");
    }

    #[test]
    fn strips_colour_and_title_sequences() {
        let input = "ok \u{1b}[31mred\u{1b}[0m \u{1b}]0;title\u{7} done";
        assert_eq!(decorate(input), "ok red  done");
    }

    #[test]
    fn strips_string_terminated_sequences() {
        assert_eq!(decorate("a\u{1b}Ppayload\u{1b}\\b"), "ab");
    }

    #[test]
    fn drops_control_characters() {
        assert_eq!(decorate("a\tb\rc\u{202e}x\n"), "a bcx");
    }

    #[test]
    fn leaves_neighbouring_blocks_alone() {
        // U+2580 (upper half block) sits just past the box-drawing range.
        assert_eq!(decorate("\u{2580}x\u{24ff}"), "\u{2580}x\u{24ff}");
    }
}
