//! Scrollable window over the rendered dashboard lines

/// A scroll request from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    LineUp,
    LineDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

/// Visible window of `height` lines starting at `offset`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    height: usize,
    offset: usize,
    /// Stick to the last line as content grows
    follow_tail: bool,
}

impl Viewport {
    pub fn new(height: usize) -> Self {
        Self {
            height: height.max(1),
            offset: 0,
            follow_tail: false,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
    }

    fn max_offset(&self, content_len: usize) -> usize {
        content_len.saturating_sub(self.height)
    }

    /// Apply a scroll command against content of `content_len` lines
    pub fn scroll(&mut self, command: ScrollCommand, content_len: usize) {
        let max = self.max_offset(content_len);
        let page = self.height.saturating_sub(1).max(1);

        self.offset = match command {
            ScrollCommand::LineUp => self.offset.saturating_sub(1),
            ScrollCommand::LineDown => (self.offset + 1).min(max),
            ScrollCommand::PageUp => self.offset.saturating_sub(page),
            ScrollCommand::PageDown => (self.offset + page).min(max),
            ScrollCommand::Top => 0,
            ScrollCommand::Bottom => max,
        };
        self.follow_tail = self.offset == max && command != ScrollCommand::Top && max > 0;
    }

    /// Lines currently in view, clamping the offset to the content
    pub fn visible<'a>(&mut self, lines: &'a [String]) -> &'a [String] {
        let max = self.max_offset(lines.len());
        if self.follow_tail || self.offset > max {
            self.offset = max;
        }
        let end = (self.offset + self.height).min(lines.len());
        &lines[self.offset..end]
    }

    /// "12-40/93" style position indicator
    pub fn position(&self, content_len: usize) -> String {
        if content_len == 0 {
            return "0/0".to_string();
        }
        let first = self.offset.min(content_len - 1) + 1;
        let last = (self.offset + self.height).min(content_len);
        format!("{first}-{last}/{content_len}")
    }
}
