use serde::Serialize;

/// Marker preceding a frame's source location
const LOCATION_MARKER: &str = " (at ";

/// Source location referenced by a stack frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub path: String,
    pub line: String,
}

/// One line of a stack trace
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    /// The frame as logged, trimmed
    pub text: String,
    pub location: Option<SourceLocation>,
}

impl StackFrame {
    fn parse(line: &str) -> Self {
        Self {
            text: line.to_string(),
            location: parse_location(line),
        }
    }

    /// Frame text with its location rendered as `path:line`
    pub fn display(&self) -> String {
        match (&self.location, self.text.find(LOCATION_MARKER)) {
            (Some(location), Some(index)) => format!(
                "{}{}{}:{})",
                &self.text[..index],
                LOCATION_MARKER,
                location.path,
                location.line
            ),
            _ => self.text.clone(),
        }
    }
}

/// Split a stack trace into frames
///
/// Leading frames from the logging machinery itself (lines mentioning `Log`
/// or `StackTrace (`) are skipped.
pub fn parse_stack(stack: &str) -> Vec<StackFrame> {
    stack
        .split('\n')
        .map(str::trim)
        .skip_while(|line| line.contains("Log") || line.contains("StackTrace ("))
        .filter(|line| !line.is_empty())
        .map(StackFrame::parse)
        .collect()
}

/// Extract `path:line` from a `" (at path:line)"` suffix
///
/// The last `:` and `)` are used since paths may contain either. Locations
/// given as an `<id>` placeholder have no usable path.
fn parse_location(line: &str) -> Option<SourceLocation> {
    let index = line.find(LOCATION_MARKER)?;
    if index == 0 {
        return None;
    }
    let rest = &line[index + LOCATION_MARKER.len()..];
    if rest.starts_with('<') {
        return None;
    }

    let colon = rest.rfind(':')?;
    let close = rest.rfind(')')?;
    if colon == 0 || close <= colon {
        return None;
    }

    Some(SourceLocation {
        path: rest[..colon].to_string(),
        line: rest[colon + 1..close].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_with_location() {
        let frames = parse_stack("Game.Player:Update () (at Assets/Scripts/Player.cs:42)");
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].location,
            Some(SourceLocation {
                path: "Assets/Scripts/Player.cs".to_string(),
                line: "42".to_string(),
            })
        );
    }

    #[test]
    fn test_windows_path_uses_last_colon() {
        let frames = parse_stack("Foo:Bar () (at C:/proj/Foo.cs:7)");
        let location = frames[0].location.as_ref().unwrap();
        assert_eq!(location.path, "C:/proj/Foo.cs");
        assert_eq!(location.line, "7");
    }

    #[test]
    fn test_placeholder_location_is_ignored() {
        let frames = parse_stack("Foo:Bar () (at <4a5b6c>:0)");
        assert_eq!(frames[0].location, None);
    }

    #[test]
    fn test_skips_leading_logging_frames() {
        let stack = "UnityEngine.Debug:Log (object)\n\
                     UnityEngine.StackTraceUtility:ExtractStackTrace ()\n\
                     Game.Net:Connect () (at Assets/Net.cs:10)\n\
                     Game.Logger:Flush () (at Assets/Logger.cs:3)";
        let frames = parse_stack(stack);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].text.starts_with("Game.Net:Connect"));
        // only leading frames are skipped
        assert!(frames[1].text.starts_with("Game.Logger:Flush"));
    }

    #[test]
    fn test_display() {
        let frames = parse_stack("Foo:Bar () (at Assets/Foo.cs:12)\nNo location here");
        assert_eq!(frames[0].display(), "Foo:Bar () (at Assets/Foo.cs:12)");
        assert_eq!(frames[1].display(), "No location here");
    }

    #[test]
    fn test_empty_stack() {
        assert!(parse_stack("").is_empty());
    }
}
