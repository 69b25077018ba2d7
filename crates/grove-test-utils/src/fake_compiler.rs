use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use grove_core::{Diagnostic, FileId, Position, Range};
use grove_workspace::{
    modifiers, AstSymbol, ClassSignature, CompileEnvironment, CompileError, CompileOutput,
    Compiler, FieldSignature, FileAst, MethodSignature, SourceSet, SymbolKind,
};

/// Diagnostic code of "unable to resolve class" warnings.
pub const UNRESOLVED_CLASS_CODE: &str = "unresolved-class";

const BUILTIN_TYPES: &[&str] = &[
    "void", "boolean", "byte", "char", "short", "int", "long", "float", "double", "def", "var",
    "String", "Object",
];

const MODIFIERS: &[(&str, u16)] = &[
    ("public", modifiers::PUBLIC),
    ("private", modifiers::PRIVATE),
    ("protected", modifiers::PROTECTED),
    ("static", modifiers::STATIC),
    ("final", modifiers::FINAL),
    ("abstract", modifiers::ABSTRACT),
];

/// A deterministic compiler for a line-based toy language:
///
/// ```text
/// class Main extends Base implements Runnable, Closeable {
///     Util helper
///     void run(String name, int count) {
///         def u = new Util()
///     }
/// }
/// ```
///
/// Declarations must sit on their own line. Unbalanced braces fail the whole compile with source
/// errors (no ASTs), like a Groovy parse failure. Class names that resolve neither inside the
/// source set nor through the environment produce `unable to resolve class` warnings.
#[derive(Debug, Default)]
pub struct FakeCompiler {
    compiles: AtomicUsize,
    last_files: Mutex<Vec<PathBuf>>,
    fail_next: Mutex<Option<String>>,
    failing: Mutex<Option<String>>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compile invocations so far.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    /// Paths handed to the most recent compile, sorted.
    pub fn last_files(&self) -> Vec<PathBuf> {
        lock(&self.last_files).clone()
    }

    /// Makes the next compile fail internally with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *lock(&self.fail_next) = Some(message.into());
    }

    /// Makes every compile fail internally until cleared with `None`.
    pub fn set_failing(&self, message: Option<String>) {
        *lock(&self.failing) = message;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Compiler for FakeCompiler {
    fn compile(
        &self,
        sources: &SourceSet,
        env: &CompileEnvironment,
    ) -> Result<CompileOutput, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let mut files: Vec<PathBuf> = sources.iter().map(|source| source.path.clone()).collect();
        files.sort();
        *lock(&self.last_files) = files;

        let failure = lock(&self.fail_next)
            .take()
            .or_else(|| lock(&self.failing).clone());
        if let Some(message) = failure {
            return Err(CompileError::Internal(message));
        }

        let mut parsed: BTreeMap<FileId, ParsedFile> = BTreeMap::new();
        let mut syntax_errors: BTreeMap<FileId, Vec<Diagnostic>> = BTreeMap::new();
        for source in sources.iter() {
            match parse(&source.text) {
                Ok(file) => {
                    parsed.insert(source.file, file);
                }
                Err(errors) => {
                    syntax_errors.insert(source.file, errors);
                }
            }
        }
        if !syntax_errors.is_empty() {
            tracing::trace!(
                target: "grove.test_utils",
                files = syntax_errors.len(),
                "fake compile hit syntax errors"
            );
            return Err(CompileError::Source(syntax_errors));
        }

        let declared: BTreeSet<String> = parsed
            .values()
            .flat_map(|file| file.ast.classes.iter())
            .map(|class| class.name.clone())
            .collect();

        let mut output = CompileOutput::default();
        for (file, parsed_file) in parsed {
            let mut reported = BTreeSet::new();
            let unresolved: Vec<Diagnostic> = parsed_file
                .type_uses
                .iter()
                .filter(|(name, _)| !declared.contains(name) && !env.knows_class(name))
                .filter(|(name, _)| reported.insert(name.clone()))
                .map(|(name, range)| {
                    Diagnostic::warning(*range, format!("unable to resolve class {name}"))
                        .with_code(UNRESOLVED_CLASS_CODE)
                })
                .collect();
            if !unresolved.is_empty() {
                output.diagnostics.insert(file, unresolved);
            }
            output.asts.insert(file, parsed_file.ast);
        }
        Ok(output)
    }
}

#[derive(Debug, Default)]
struct ParsedFile {
    ast: FileAst,
    /// Non-builtin class names used as types, with the range of each use.
    type_uses: Vec<(String, Range)>,
}

#[derive(Debug)]
struct ClassBuilder {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    methods: Vec<MethodSignature>,
    fields: Vec<FieldSignature>,
}

impl ClassBuilder {
    fn finish(self) -> ClassSignature {
        ClassSignature::new(
            self.name,
            self.superclass,
            self.interfaces,
            self.methods,
            self.fields,
        )
    }
}

fn parse(text: &str) -> Result<ParsedFile, Vec<Diagnostic>> {
    let mut parsed = ParsedFile::default();
    let mut errors = Vec::new();
    let mut classes: Vec<ClassBuilder> = Vec::new();
    let mut depth: i32 = 0;
    let mut last_line = 0u32;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = line_no as u32;
        last_line = line;
        let code = raw_line.split("//").next().unwrap_or_default();
        let words = words(code);

        if depth == 0 {
            if let Some(class) = parse_class_header(code, line, &words, &mut parsed) {
                classes.push(class);
            }
        } else if depth == 1 {
            if let Some(class) = classes.last_mut() {
                parse_member(code, line, &words, class, &mut parsed);
            }
        } else {
            for (start, word) in &words {
                if word.chars().next().is_some_and(char::is_alphabetic) {
                    parsed.ast.symbols.push(AstSymbol {
                        name: (*word).to_owned(),
                        range: word_range(code, line, *start, word),
                        kind: SymbolKind::Reference,
                    });
                }
            }
        }

        for pair in words.windows(2) {
            if let [(_, "new"), (type_start, type_name)] = pair {
                use_type(&mut parsed, type_name, word_range(code, line, *type_start, type_name));
            }
        }

        for (byte, ch) in code.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        let pos = Position::new(line, utf16_col(code, byte));
                        errors.push(Diagnostic::error(
                            Range::new(pos, Position::new(line, pos.character + 1)),
                            "unexpected '}'",
                        ));
                        depth = 0;
                    }
                }
                _ => {}
            }
        }
    }

    if depth > 0 {
        errors.push(Diagnostic::error(
            Range::point(Position::new(last_line, 0)),
            "missing '}'",
        ));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    parsed.ast.classes = classes.into_iter().map(ClassBuilder::finish).collect();
    let own: BTreeSet<String> = parsed
        .ast
        .classes
        .iter()
        .map(|class| class.name.clone())
        .collect();
    parsed.type_uses.retain(|(name, _)| !own.contains(name));
    Ok(parsed)
}

fn parse_class_header(
    code: &str,
    line: u32,
    words: &[(usize, &str)],
    parsed: &mut ParsedFile,
) -> Option<ClassBuilder> {
    let mut rest = words.iter().skip_while(|(_, word)| modifier(word).is_some());
    let (_, keyword) = rest.next()?;
    let is_interface = match *keyword {
        "class" => false,
        "interface" => true,
        _ => return None,
    };
    let (name_start, name) = rest.next()?;
    parsed.ast.symbols.push(AstSymbol {
        name: (*name).to_owned(),
        range: word_range(code, line, *name_start, name),
        kind: SymbolKind::Class,
    });

    let mut class = ClassBuilder {
        name: (*name).to_owned(),
        superclass: None,
        interfaces: Vec::new(),
        methods: Vec::new(),
        fields: Vec::new(),
    };
    let mut in_implements = false;
    let mut expect_super = false;
    for (start, word) in rest {
        match *word {
            "extends" => expect_super = true,
            "implements" => in_implements = true,
            _ => {
                use_type(parsed, word, word_range(code, line, *start, word));
                if in_implements || (expect_super && is_interface) {
                    class.interfaces.push((*word).to_owned());
                } else if expect_super {
                    class.superclass = Some((*word).to_owned());
                    expect_super = false;
                }
            }
        }
    }
    Some(class)
}

fn parse_member(
    code: &str,
    line: u32,
    words: &[(usize, &str)],
    class: &mut ClassBuilder,
    parsed: &mut ParsedFile,
) {
    let mut flags = 0u16;
    let mut rest = words.iter().peekable();
    while let Some(flag) = rest.peek().and_then(|(_, word)| modifier(word)) {
        flags |= flag;
        rest.next();
    }
    if flags & (modifiers::PRIVATE | modifiers::PROTECTED) == 0 {
        flags |= modifiers::PUBLIC;
    }
    let (Some((type_start, type_name)), Some((name_start, name))) = (rest.next(), rest.next())
    else {
        return;
    };
    if *type_name == "new" || *name == "new" {
        return;
    }
    use_type(parsed, type_name, word_range(code, line, *type_start, type_name));

    let Some(open) = code.find('(') else {
        parsed.ast.symbols.push(AstSymbol {
            name: (*name).to_owned(),
            range: word_range(code, line, *name_start, name),
            kind: SymbolKind::Field,
        });
        class.fields.push(FieldSignature {
            name: (*name).to_owned(),
            type_name: (*type_name).to_owned(),
            modifiers: flags,
        });
        return;
    };

    let close = code[open..].find(')').map_or(code.len(), |idx| open + idx);
    let mut parameter_types = Vec::new();
    let mut offset = open + 1;
    for param in code[open + 1..close].split(',') {
        let param_words = words_at(param, offset);
        match param_words.as_slice() {
            [(start, ty), _, ..] => {
                use_type(parsed, ty, word_range(code, line, *start, ty));
                parameter_types.push((*ty).to_owned());
            }
            [_] => parameter_types.push("def".to_owned()),
            [] => {}
        }
        offset += param.len() + 1;
    }

    parsed.ast.symbols.push(AstSymbol {
        name: (*name).to_owned(),
        range: word_range(code, line, *name_start, name),
        kind: SymbolKind::Method,
    });
    class.methods.push(MethodSignature {
        name: (*name).to_owned(),
        parameter_types,
        return_type: (*type_name).to_owned(),
        modifiers: flags,
    });
}

fn use_type(parsed: &mut ParsedFile, name: &str, range: Range) {
    if BUILTIN_TYPES.contains(&name) || !name.chars().next().is_some_and(char::is_alphabetic) {
        return;
    }
    parsed.ast.references.insert(name.to_owned());
    parsed.ast.symbols.push(AstSymbol {
        name: name.to_owned(),
        range,
        kind: SymbolKind::Reference,
    });
    parsed.type_uses.push((name.to_owned(), range));
}

fn modifier(word: &str) -> Option<u16> {
    MODIFIERS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, flag)| *flag)
}

/// Identifier-like words (letters, digits, `_`, `.`) with their byte offsets.
fn words(code: &str) -> Vec<(usize, &str)> {
    words_at(code, 0)
}

fn words_at(code: &str, base: usize) -> Vec<(usize, &str)> {
    let is_word = |ch: char| ch.is_alphanumeric() || ch == '_' || ch == '.';
    let mut out = Vec::new();
    let mut start = None;
    for (idx, ch) in code.char_indices() {
        match (start, is_word(ch)) {
            (None, true) => start = Some(idx),
            (Some(begin), false) => {
                out.push((base + begin, &code[begin..idx]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        out.push((base + begin, &code[begin..]));
    }
    out
}

fn utf16_col(line: &str, byte: usize) -> u32 {
    line[..byte].encode_utf16().count() as u32
}

fn word_range(line_text: &str, line: u32, start: usize, word: &str) -> Range {
    let start_col = utf16_col(line_text, start);
    let end_col = start_col + word.encode_utf16().count() as u32;
    Range::new(Position::new(line, start_col), Position::new(line, end_col))
}
