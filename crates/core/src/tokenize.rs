use std::collections::HashMap;

// non-negative ids index the symbol table; negative ids encode one
// punctuation character as -1 - position within PUNCTUATION
pub type SymbolId = i32;

// characters that always stand alone as single-character tokens
pub const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^`{|}~";

#[derive(Debug, Clone)]
pub struct SymbolTable {
    ids: HashMap<String, SymbolId>,
    texts: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            ids: HashMap::new(),
            texts: Vec::new(),
        };
        // id 0 is reserved for the empty string
        table.intern("");
        table
    }

    pub fn intern(&mut self, text: &str) -> SymbolId {
        if let Some(&id) = self.ids.get(text) {
            return id;
        }
        let id = self.texts.len() as SymbolId;
        self.ids.insert(text.to_string(), id);
        self.texts.push(text.to_string());
        id
    }

    pub fn text(&self, id: SymbolId) -> &str {
        if id < 0 {
            punct_text(id)
        } else {
            self.texts.get(id as usize).map_or("", String::as_str)
        }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

fn punct_id(c: char) -> Option<SymbolId> {
    PUNCTUATION.find(c).map(|pos| -1 - pos as SymbolId)
}

pub fn punct_text(id: SymbolId) -> &'static str {
    let pos = (-1 - id) as usize;
    &PUNCTUATION[pos..pos + 1]
}

// spaces holds the whitespace run before each token and one more after the
// last, so spaces.len() == content.len() + 1 always holds
#[derive(Debug, Clone)]
pub struct TokenFile {
    pub path: String,
    pub group: String,
    pub is_template: bool,
    pub content: Vec<SymbolId>,
    pub spaces: Vec<String>,
}

impl TokenFile {
    pub fn parse(path: impl Into<String>, source: &str, symbols: &mut SymbolTable) -> Self {
        let (content, spaces) = scan(source, symbols);
        Self {
            path: path.into(),
            group: String::new(),
            is_template: false,
            content,
            spaces,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

fn scan(source: &str, symbols: &mut SymbolTable) -> (Vec<SymbolId>, Vec<String>) {
    let mut content = Vec::new();
    let mut spaces = Vec::new();
    let mut current = String::new();
    let mut in_spaces = true;

    for c in source.chars() {
        if in_spaces {
            if c.is_ascii_whitespace() {
                current.push(c);
                continue;
            }
            spaces.push(std::mem::take(&mut current));
            in_spaces = false;
        }
        if c.is_ascii_whitespace() {
            flush_word(&mut content, &mut current, symbols);
            in_spaces = true;
            current.push(c);
        } else if let Some(id) = punct_id(c) {
            if !current.is_empty() {
                // a word runs straight into punctuation: empty run between
                flush_word(&mut content, &mut current, symbols);
                spaces.push(String::new());
            }
            content.push(id);
            in_spaces = true;
        } else {
            current.push(c);
        }
    }
    if in_spaces {
        spaces.push(current);
    } else {
        flush_word(&mut content, &mut current, symbols);
        spaces.push(String::new());
    }
    debug_assert_eq!(spaces.len(), content.len() + 1);

    (content, spaces)
}

fn flush_word(content: &mut Vec<SymbolId>, current: &mut String, symbols: &mut SymbolTable) {
    content.push(symbols.intern(current));
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> TokenFile {
        let mut symbols = SymbolTable::new();
        TokenFile::parse("test", source, &mut symbols)
    }

    #[test]
    fn empty_string_is_reserved() {
        let mut symbols = SymbolTable::new();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols.intern(""), 0);
        assert_eq!(symbols.text(0), "");
    }

    #[test]
    fn interning_is_stable() {
        let mut symbols = SymbolTable::new();
        let a = symbols.intern("alpha");
        let b = symbols.intern("beta");
        assert_ne!(a, b);
        assert_eq!(symbols.intern("alpha"), a);
        assert_eq!(symbols.text(a), "alpha");
        assert_eq!(symbols.text(b), "beta");
    }

    #[test]
    fn spaces_always_outnumber_tokens_by_one() {
        for source in ["", "   ", "a", " a ", "a;b", "int a = 1;\n", "x\ty\nz"] {
            let file = parse(source);
            assert_eq!(
                file.spaces.len(),
                file.content.len() + 1,
                "source {source:?}"
            );
        }
    }

    #[test]
    fn empty_input_yields_one_empty_run() {
        let file = parse("");
        assert!(file.content.is_empty());
        assert_eq!(file.spaces, vec![String::new()]);
    }

    #[test]
    fn whitespace_only_input_is_one_run() {
        let file = parse(" \t\n");
        assert!(file.content.is_empty());
        assert_eq!(file.spaces, vec![" \t\n".to_string()]);
    }

    #[test]
    fn punctuation_splits_words() {
        let file = parse("a+b");
        assert_eq!(file.content.len(), 3);
        assert!(file.content[0] >= 0);
        assert!(file.content[1] < 0);
        assert!(file.content[2] >= 0);
        assert_eq!(file.spaces, vec![""; 4]);
    }

    #[test]
    fn adjacent_punctuation_stays_separate() {
        let file = parse(";;");
        assert_eq!(file.content.len(), 2);
        assert_eq!(file.content[0], file.content[1]);
        assert!(file.content[0] < 0);
    }

    #[test]
    fn punctuation_ids_are_distinct_and_negative() {
        let mut seen = std::collections::HashSet::new();
        for c in PUNCTUATION.chars() {
            let id = punct_id(c).unwrap();
            assert!(id < 0);
            assert!(seen.insert(id));
            assert_eq!(punct_text(id), c.to_string());
        }
    }

    #[test]
    fn underscores_and_digits_join_words() {
        let file = parse("foo_bar1 baz");
        assert_eq!(file.content.len(), 2);
        assert!(file.content.iter().all(|&id| id >= 0));
    }

    #[test]
    fn runs_are_preserved_verbatim() {
        let file = parse("  if (x)\n\treturn;\n");
        let rebuilt: String = {
            let mut symbols = SymbolTable::new();
            let again = TokenFile::parse("t", "  if (x)\n\treturn;\n", &mut symbols);
            let mut out = String::new();
            for (i, &id) in again.content.iter().enumerate() {
                out.push_str(&again.spaces[i]);
                out.push_str(symbols.text(id));
            }
            out.push_str(again.spaces.last().unwrap());
            out
        };
        assert_eq!(rebuilt, "  if (x)\n\treturn;\n");
        assert_eq!(file.spaces[0], "  ");
    }

    #[test]
    fn same_source_same_tokens_across_fresh_tables() {
        let a = parse("int main() { return 0; }");
        let b = parse("int main() { return 0; }");
        assert_eq!(a.content, b.content);
        assert_eq!(a.spaces, b.spaces);
    }
}
