use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

/// A source file together with a line-start index used to recover the text of a
/// line when reporting diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: SourceId,
    pub path: PathBuf,
    pub contents: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(id: SourceId, path: PathBuf, contents: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                contents
                    .char_indices()
                    .filter(|(_, ch)| *ch == '\n')
                    .map(|(index, _)| index + 1),
            )
            .collect();
        Self {
            id,
            path,
            contents,
            line_starts,
        }
    }

    /// Text of a one-based line, without its line terminator.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.contents.len());
        let text = self.contents.get(start..end)?;
        Some(text.strip_suffix('\r').unwrap_or(text))
    }
}
