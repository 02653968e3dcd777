//! Lexical recognition of `//gpu:` directive comments.

/// Comment prefix shared by every directive.
pub const PREFIX: &str = "//gpu:";

/// One recognised directive line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    Start,
    End,
    Wgsl,
    NoWgsl,
    /// `//gpu:vars [System]`
    Vars(Option<String>),
    /// `//gpu:group [-uniform] Name`
    Group { name: String, uniform: bool },
    ReadOnly,
    ReadWrite,
    Dims(usize),
    NBuffs(usize),
    Size(u64),
    /// A `//gpu:` comment this compiler does not know.
    Unknown(String),
}

impl Directive {
    /// Recognise a directive on a trimmed line. Returns `None` when the
    /// line is not a directive at all; malformed arguments are `Err`.
    pub fn parse(trimmed: &str) -> Option<Result<Directive, String>> {
        let rest = trimmed.strip_prefix(PREFIX)?;
        let mut words = rest.split_whitespace();
        let head = words.next().unwrap_or("");
        let args: Vec<&str> = words.collect();
        Some(Self::from_words(head, &args))
    }

    fn from_words(head: &str, args: &[&str]) -> Result<Directive, String> {
        let directive = match head {
            "start" => Directive::Start,
            "end" => Directive::End,
            "wgsl" => Directive::Wgsl,
            "nowgsl" => Directive::NoWgsl,
            "vars" => match args {
                [] => Directive::Vars(None),
                [system] => Directive::Vars(Some(system.to_string())),
                _ => return Err("expected `//gpu:vars [System]`".to_string()),
            },
            "group" => match args {
                [name] if !name.starts_with('-') => Directive::Group {
                    name: name.to_string(),
                    uniform: false,
                },
                ["-uniform", name] => Directive::Group {
                    name: name.to_string(),
                    uniform: true,
                },
                _ => return Err("expected `//gpu:group [-uniform] Name`".to_string()),
            },
            "read-only" => Directive::ReadOnly,
            "read-write" => Directive::ReadWrite,
            "dims" => Directive::Dims(number(head, args)?),
            "nbuffs" => {
                let n = number(head, args)?;
                if n == 0 {
                    return Err("`//gpu:nbuffs` must be at least 1".to_string());
                }
                Directive::NBuffs(n)
            }
            "size" => Directive::Size(number(head, args)?),
            other => Directive::Unknown(other.to_string()),
        };
        Ok(directive)
    }

    /// Whether this directive only makes sense inside a vars region.
    pub fn is_var_attribute(&self) -> bool {
        matches!(
            self,
            Directive::Group { .. }
                | Directive::ReadOnly
                | Directive::ReadWrite
                | Directive::Dims(_)
                | Directive::NBuffs(_)
                | Directive::Size(_)
        )
    }
}

fn number<T: std::str::FromStr>(head: &str, args: &[&str]) -> Result<T, String> {
    match args {
        [n] => n
            .parse()
            .map_err(|_| format!("`//gpu:{}` expects a number, found `{}`", head, n)),
        _ => Err(format!("expected `//gpu:{} N`", head)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Directive, String> {
        Directive::parse(line).expect("not a directive")
    }

    #[test]
    fn test_region_directives() {
        assert_eq!(parse("//gpu:start"), Ok(Directive::Start));
        assert_eq!(parse("//gpu:end"), Ok(Directive::End));
        assert_eq!(parse("//gpu:wgsl"), Ok(Directive::Wgsl));
        assert_eq!(parse("//gpu:nowgsl"), Ok(Directive::NoWgsl));
        assert_eq!(parse("//gpu:vars"), Ok(Directive::Vars(None)));
        assert_eq!(
            parse("//gpu:vars Physics"),
            Ok(Directive::Vars(Some("Physics".to_string())))
        );
    }

    #[test]
    fn test_var_attributes() {
        assert_eq!(
            parse("//gpu:group -uniform Params"),
            Ok(Directive::Group {
                name: "Params".to_string(),
                uniform: true
            })
        );
        assert_eq!(parse("//gpu:dims 3"), Ok(Directive::Dims(3)));
        assert_eq!(parse("//gpu:size 1000000"), Ok(Directive::Size(1_000_000)));
        assert!(parse("//gpu:nbuffs 0").is_err());
        assert!(parse("//gpu:dims x").is_err());
        assert!(parse("//gpu:group").is_err());
        assert!(parse("//gpu:read-only").unwrap().is_var_attribute());
    }

    #[test]
    fn test_non_directives() {
        assert!(Directive::parse("// gpu:start").is_none());
        assert!(Directive::parse("let x = 1;").is_none());
        assert_eq!(
            parse("//gpu:frobnicate"),
            Ok(Directive::Unknown("frobnicate".to_string()))
        );
    }
}
