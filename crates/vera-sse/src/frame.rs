/// Event type assumed for frames without an `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
/// One complete protocol unit taken from the wire.
pub struct Frame {
    pub event_type: String,
    pub payload: String,
    pub sequence_id: Option<u64>,
}

impl Frame {
    /// Server-supplied id, with absent or unparsable ids reading as `0`.
    pub fn server_id(&self) -> u64 {
        self.sequence_id.unwrap_or(0)
    }
}

/// Parses one delimiter-free frame block.
///
/// Returns `None` when the block carries no `data:` line; such frames have
/// nothing to decode. Multiple `data:` lines are joined with `\n`.
pub fn parse_frame(block: &str) -> Option<Frame> {
    let mut event_type: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut sequence_id = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event_type = Some(value.trim().to_string()),
            "data" => data_lines.push(value),
            "id" => sequence_id = value.trim().parse::<u64>().ok(),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let event_type = event_type
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string());
    Some(Frame {
        event_type,
        payload: data_lines.join("\n"),
        sequence_id,
    })
}
