/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::Write;

/// Text sink for the codec's human-readable trace and statistics lines.
///
/// The codec never touches stdout; callers inject whatever sink they want
/// at construction. Sinks are line oriented and best effort - a sink that
/// fails to write simply loses the line.
pub trait TraceSink {
    fn line(&mut self, text: &str);
}

/// Discards every line. The default sink.
#[derive(Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn line(&mut self, _text: &str) {}
}

/// Adapts any `std::io::Write` into a trace sink, one line per call.
pub struct WriteSink<W> {
    writer: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        WriteSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for WriteSink<W> {
    fn line(&mut self, text: &str) {
        let _ = writeln!(self.writer, "{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_sink_appends_newline_per_line() {
        let mut sink = WriteSink::new(Vec::new());
        sink.line("INFO: one");
        sink.line("INFO: two");

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "INFO: one\nINFO: two\n");
    }
}
