/// Single-line editable text with a cursor.
///
/// The cursor is a char index, always on a char boundary of `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    text: String,
    cursor: usize,
}

impl TextInput {
    pub fn new(text: &str) -> Self {
        let mut input = Self::default();
        input.set_text(text);
        input
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cursor position in chars.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the text and put the cursor at its end.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.char_len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, ch: char) {
        let at = self.byte_offset(self.cursor);
        self.text.insert(at, ch);
        self.cursor += 1;
    }

    pub fn remove_char_back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = self.byte_offset(self.cursor);
        self.text.remove(at);
        true
    }

    pub fn remove_char_forward(&mut self) -> bool {
        if self.cursor >= self.char_len() {
            return false;
        }
        let at = self.byte_offset(self.cursor);
        self.text.remove(at);
        true
    }

    /// Delete from the start of the previous word up to the cursor.
    pub fn remove_word_back(&mut self) -> bool {
        let start = self.word_start_before(self.cursor);
        if start == self.cursor {
            return false;
        }
        let (from, to) = (self.byte_offset(start), self.byte_offset(self.cursor));
        self.text.replace_range(from..to, "");
        self.cursor = start;
        true
    }

    pub fn move_back(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_forward(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_len());
    }

    pub fn move_front(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_len();
    }

    pub fn move_word_back(&mut self) {
        self.cursor = self.word_start_before(self.cursor);
    }

    pub fn move_word_forward(&mut self) {
        let chars: Vec<char> = self.text.chars().collect();
        let mut index = self.cursor;
        while index < chars.len() && chars[index].is_whitespace() {
            index += 1;
        }
        while index < chars.len() && !chars[index].is_whitespace() {
            index += 1;
        }
        self.cursor = index;
    }

    fn word_start_before(&self, cursor: usize) -> usize {
        let chars: Vec<char> = self.text.chars().take(cursor).collect();
        let mut index = chars.len();
        while index > 0 && chars[index - 1].is_whitespace() {
            index -= 1;
        }
        while index > 0 && !chars[index - 1].is_whitespace() {
            index -= 1;
        }
        index
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map_or(self.text.len(), |(offset, _)| offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_at_the_cursor() {
        let mut input = TextInput::new("fox");
        input.move_front();
        input.insert('a');
        input.insert(' ');
        assert_eq!(input.text(), "a fox");
        assert_eq!(input.cursor(), 2);

        input.move_end();
        input.insert('é');
        input.insert('!');
        assert_eq!(input.text(), "a foxé!");
        assert_eq!(input.cursor(), 7);
    }

    #[test]
    fn removes_chars_around_multibyte_text() {
        let mut input = TextInput::new("née");
        assert!(input.remove_char_back());
        assert_eq!(input.text(), "né");
        input.move_back();
        assert!(input.remove_char_forward());
        assert_eq!(input.text(), "n");
        assert!(!input.remove_char_forward());
        input.move_front();
        assert!(!input.remove_char_back());
    }

    #[test]
    fn word_motions_and_deletion() {
        let mut input = TextInput::new("ssh  user@host  ");
        assert!(input.remove_word_back());
        assert_eq!(input.text(), "ssh  ");

        input.set_text("one two three");
        input.move_word_back();
        assert_eq!(input.cursor(), 8);
        input.move_word_back();
        assert_eq!(input.cursor(), 4);
        input.move_word_forward();
        assert_eq!(input.cursor(), 7);

        input.move_front();
        assert!(!input.remove_word_back());
    }

    #[test]
    fn clear_resets_cursor() {
        let mut input = TextInput::new("abc");
        input.clear();
        assert_eq!(input, TextInput::default());
    }
}
