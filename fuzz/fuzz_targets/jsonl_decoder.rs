#![no_main]

use libfuzzer_sys::fuzz_target;
use trace_ingest::config::ReaderConfig;
use trace_ingest::decoder::JsonLinesDecoder;
use trace_ingest::reader::TraceReader;
use trace_ingest::string_pool::StringPool;
use trace_ingest::trace_info::TraceInfo;

fuzz_target!(|data: &[u8]| {
    // Decoding and classifying arbitrary bytes must never panic
    let reader = match TraceReader::new(ReaderConfig::default()) {
        Ok(reader) => reader,
        Err(_) => return,
    };
    let mut pool = StringPool::new();
    let _ = reader.read_source(
        JsonLinesDecoder::new(data),
        TraceInfo::new("fuzz"),
        &mut pool,
        |_, _, _| 0,
    );
});
