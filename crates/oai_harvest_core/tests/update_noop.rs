use oai_harvest_core::{update, HarvestMachine, HarvestRecord, Msg, ParsedPage, SessionState};

#[test]
fn continue_before_start_is_noop() {
    let machine = HarvestMachine::default();
    let (next, effects) = update(machine.clone(), Msg::Continue);

    assert_eq!(machine, next);
    assert!(effects.is_empty());
}

#[test]
fn page_without_request_is_ignored() {
    let machine = HarvestMachine::default();
    let page = Msg::PageParsed(ParsedPage::RecordBatch {
        records: vec![HarvestRecord::new("oai:x:1", "2024-01-01")],
        resumption_token: None,
    });
    let (next, effects) = update(machine.clone(), page);

    assert_eq!(machine, next);
    assert!(effects.is_empty());
}

#[test]
fn cancelled_session_ignores_everything() {
    let (cancelled, _) = update(HarvestMachine::default(), Msg::Cancel);
    assert_eq!(cancelled.state(), SessionState::Cancelled);

    for msg in [Msg::Start, Msg::Continue, Msg::Cancel] {
        let (next, effects) = update(cancelled.clone(), msg);
        assert_eq!(next, cancelled);
        assert!(effects.is_empty());
    }
}
