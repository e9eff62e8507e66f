//! Per-function emission state: a text buffer plus the register and label
//! counters needed to keep generated names unique within one function.
//! Mirrors the analyzer's own per-body scoping — one `FunctionEmitter` per
//! method, constructor, or the synthetic `main`.

pub struct FunctionEmitter {
    buf: String,
    reg_counter: u32,
    label_counter: u32,
    terminated: bool,
}

impl FunctionEmitter {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            reg_counter: 0,
            label_counter: 0,
            terminated: false,
        }
    }

    pub fn fresh_reg(&mut self) -> String {
        let name = format!("%t{}", self.reg_counter);
        self.reg_counter += 1;
        name
    }

    pub fn fresh_label(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.label_counter);
        self.label_counter += 1;
        name
    }

    /// True once the current block has a terminator (`ret`/`br`/`switch`);
    /// no further instruction may be appended until [`Self::start_block`]
    /// opens a new one.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Appends one instruction line, unless the current block is already
    /// terminated (dead code after an early `return` is dropped before
    /// emission runs, but a block can still end early from a nested
    /// `if`/`while` whose every path returns).
    pub fn emit(&mut self, line: impl AsRef<str>) {
        if self.terminated {
            return;
        }
        self.buf.push_str("  ");
        self.buf.push_str(line.as_ref());
        self.buf.push('\n');
    }

    pub fn terminate(&mut self, line: impl AsRef<str>) {
        if self.terminated {
            return;
        }
        self.emit(line);
        self.terminated = true;
    }

    pub fn start_block(&mut self, label: &str) {
        self.buf.push_str(label);
        self.buf.push_str(":\n");
        self.terminated = false;
    }

    pub fn into_body(self) -> String {
        self.buf
    }
}

impl Default for FunctionEmitter {
    fn default() -> Self {
        Self::new()
    }
}
