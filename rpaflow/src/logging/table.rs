//! Fixed-width pipe table used by the status log file.

/// A column of the log table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Header text, without surrounding spaces.
    pub title: &'static str,
    /// Content width in characters.
    pub width: usize,
}

/// Column layout, in write order.
pub const COLUMNS: [Column; 9] = [
    Column { title: "TIMESTAMP", width: 25 },
    Column { title: "EXEC_ID", width: 12 },
    Column { title: "TRANS_ID", width: 12 },
    Column { title: "FUNCTION", width: 25 },
    Column { title: "FILE", width: 20 },
    Column { title: "LINE", width: 6 },
    Column { title: "MESSAGE", width: 40 },
    Column { title: "PROC_TYPE", width: 12 },
    Column { title: "STATUS", width: 12 },
];

const MESSAGE_COLUMN: usize = 6;

/// Spaces between a border and the cell content.
pub const PADDING: usize = 1;

/// Width at which messages wrap onto continuation rows.
pub const MESSAGE_WIDTH: usize = COLUMNS[MESSAGE_COLUMN].width;

/// The values of one log entry, already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    /// Local wall-clock stamp.
    pub timestamp: String,
    /// Execution id, `None` before one is assigned.
    pub execution_id: Option<i64>,
    /// Transaction id, `None` outside a transaction.
    pub transaction_id: Option<i64>,
    /// Logical function name.
    pub function: String,
    /// Source file name.
    pub file: String,
    /// Source line.
    pub line: u32,
    /// Full message; wrapped on output.
    pub message: String,
    /// Process type label.
    pub process_type: String,
    /// Status label.
    pub status: String,
}

/// `+-----+---...+` spanning every column.
#[must_use]
pub fn separator() -> String {
    let mut line = String::from("+");
    for col in &COLUMNS {
        line.push_str(&"-".repeat(col.width + PADDING * 2));
        line.push('+');
    }
    line
}

/// Separator, centered titles, separator; each line newline-terminated.
#[must_use]
pub fn header() -> String {
    let mut titles = String::from("|");
    for col in &COLUMNS {
        let title = format!(" {} ", col.title);
        let len = title.chars().count();
        let left = PADDING + (col.width + 1).saturating_sub(len) / 2;
        let right = (col.width + PADDING + 1).saturating_sub(len + left);
        titles.push_str(&" ".repeat(left));
        titles.push_str(&title);
        titles.push_str(&" ".repeat(right));
        titles.push('|');
    }

    let sep = separator();
    format!("{sep}\n{titles}\n{sep}\n")
}

/// Renders `row` as one table line plus a continuation line for each extra
/// wrapped line of the message.
#[must_use]
pub fn format_row(row: &TableRow) -> Vec<String> {
    let mut message_lines = wrap(&row.message, MESSAGE_WIDTH);
    if message_lines.is_empty() {
        message_lines.push(String::new());
    }

    let cells = [
        row.timestamp.clone(),
        id_cell(row.execution_id),
        id_cell(row.transaction_id),
        row.function.clone(),
        row.file.clone(),
        row.line.to_string(),
        message_lines[0].clone(),
        row.process_type.clone(),
        row.status.clone(),
    ];

    let mut lines = Vec::with_capacity(message_lines.len());
    lines.push(render(|idx| cells[idx].as_str()));
    for extra in &message_lines[1..] {
        lines.push(render(|idx| if idx == MESSAGE_COLUMN { extra.as_str() } else { "" }));
    }
    lines
}

fn id_cell(id: Option<i64>) -> String {
    id.map_or_else(|| "N/A".to_string(), |id| id.to_string())
}

fn render<'a>(cell: impl Fn(usize) -> &'a str) -> String {
    let mut line = String::from("|");
    for (idx, col) in COLUMNS.iter().enumerate() {
        let content: String = cell(idx).chars().take(col.width).collect();
        let pad = col.width - content.chars().count() + PADDING;
        line.push_str(&" ".repeat(PADDING));
        line.push_str(&content);
        line.push_str(&" ".repeat(pad));
        line.push('|');
    }
    line
}

/// Greedy word wrap: words are packed onto lines of at most `width`
/// characters; words longer than `width` are split across lines.
///
/// A `width` of zero disables wrapping and yields the words on one line.
#[must_use]
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
        return if joined.is_empty() { Vec::new() } else { vec![joined] };
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        if current_len > 0 && current_len + 1 + word.len() <= width {
            current.push(' ');
            current.extend(&word);
            current_len += 1 + word.len();
            continue;
        }

        if current_len > 0 {
            // Fill the rest of the line with the head of an oversized word.
            if word.len() > width && current_len + 1 < width {
                let room = width - current_len - 1;
                current.push(' ');
                current.extend(&word[..room]);
                word.drain(..room);
            }
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }

        while word.len() > width {
            lines.push(word.drain(..width).collect());
        }
        current_len = word.len();
        current.extend(word);
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}
