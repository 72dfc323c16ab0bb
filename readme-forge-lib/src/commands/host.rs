use std::io::Write;

/// The process environment commands write to, abstracted so commands can run under test.
pub trait Host: Send + Sync {
    // stdout for results (JSON documents and events)
    fn output(&mut self) -> impl Write;

    // stderr for diagnostics
    fn error(&mut self) -> impl Write;

    /// Terminate the process. A test host only records the code.
    fn exit(&mut self, code: i32);
}

/// Host that captures output in memory and remembers the requested exit code
#[cfg(test)]
#[derive(Debug, Default)]
pub struct TestHost {
    pub output_buf: Vec<u8>,
    pub error_buf: Vec<u8>,
    pub exit_code: Option<i32>,
}

#[cfg(test)]
impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    pub fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

#[cfg(test)]
impl Host for TestHost {
    fn output(&mut self) -> impl Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl Write {
        &mut self.error_buf
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}
