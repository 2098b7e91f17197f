use upi_extract::action::*;
use upi_extract::error::ExtractError;
use upi_extract::protocol::Pot;

fn text(parent: Pot, path: &str, child: Pot) -> String {
    label(&parent, path, &child).unwrap().to_string()
}

#[test]
fn test_check_when_contributions_equal() {
    let pot = Pot::new(0.0, 0.0, 60.0);
    assert_eq!(text(pot, "r:0:c", pot), "check");
}

#[test]
fn test_call_when_contributions_differ() {
    let parent = Pot::new(20.0, 0.0, 60.0);
    let child = Pot::new(20.0, 20.0, 60.0);
    assert_eq!(text(parent, "r:0:b20:c", child), "call");
}

#[test]
fn test_fold_regardless_of_pot() {
    let parent = Pot::new(50.0, 0.0, 60.0);
    assert_eq!(text(parent, "r:0:b50:f", parent), "fold");
    let empty = Pot::default();
    assert_eq!(text(empty, "r:0:f", empty), "fold");
    assert!(label(&empty, "r:0:f", &empty).unwrap().is_fold());
}

#[test]
fn test_first_bet_is_share_of_pot() {
    let parent = Pot::new(0.0, 0.0, 60.0);
    let child = Pot::new(0.0, 33.0, 60.0);
    assert_eq!(text(parent, "r:0:c:b33", child), "bet 55%");
}

#[test]
fn test_oop_lead_bet() {
    let parent = Pot::new(0.0, 0.0, 60.0);
    let child = Pot::new(60.0, 0.0, 60.0);
    assert_eq!(label(&parent, "r:0:b60", &child).unwrap(), ActionLabel::Bet(100));
}

#[test]
fn test_raise_is_share_of_pot_after_call() {
    let parent = Pot::new(50.0, 0.0, 60.0);
    let child = Pot::new(50.0, 125.0, 60.0);
    assert_eq!(text(parent, "r:0:b50:b125", child), "raise 47%");
}

#[test]
fn test_reraise() {
    // 60 dead, OOP bet 20, IP raised to 60; OOP re-raises to 180.
    let parent = Pot::new(20.0, 60.0, 60.0);
    let child = Pot::new(180.0, 60.0, 60.0);
    // call 40 -> pot 180, increment 120 -> 67%
    assert_eq!(label(&parent, "r:0:b20:b60:b180", &child).unwrap(), ActionLabel::Raise(67));
}

#[test]
fn test_unrecognized_token() {
    let pot = Pot::new(0.0, 0.0, 60.0);
    match label(&pot, "r:0:x", &pot) {
        Err(ExtractError::UnrecognizedAction(token)) => assert_eq!(token, "x"),
        other => panic!("expected UnrecognizedAction, got {:?}", other),
    }
    assert!(matches!(
        label(&pot, "r:0:bx", &pot),
        Err(ExtractError::UnrecognizedAction(_))
    ));
}

#[test]
fn test_bet_into_empty_pot_is_a_parse_error() {
    let parent = Pot::default();
    let child = Pot::new(0.0, 10.0, 0.0);
    assert!(matches!(
        label(&parent, "r:0:b10", &child),
        Err(ExtractError::ProtocolParse { .. })
    ));
}

#[test]
fn test_half_percent_rounds_to_even() {
    let parent = Pot::new(0.0, 0.0, 40.0);
    let child = Pot::new(25.0, 0.0, 40.0);
    assert_eq!(text(parent, "r:0:b25", child), "bet 62%");

    let parent = Pot::new(0.0, 0.0, 120.0);
    let child = Pot::new(15.0, 0.0, 120.0);
    assert_eq!(text(parent, "r:0:b15", child), "bet 12%");

    // 37.5 goes up to the even neighbour
    let parent = Pot::new(0.0, 0.0, 40.0);
    let child = Pot::new(15.0, 0.0, 40.0);
    assert_eq!(text(parent, "r:0:b15", child), "bet 38%");
}
