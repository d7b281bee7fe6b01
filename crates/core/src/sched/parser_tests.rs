use super::*;

#[test]
fn parses_bare_time() {
    let sched = parse_schedule("at 8:30").unwrap();
    assert_eq!(sched.times, vec![TimeOfDay::new(8, 30)]);
    assert_eq!(sched.weekdays, Weekday::ALL.to_vec());
    assert_eq!(sched.from, None);
    assert_eq!(sched.to, None);
}

#[test]
fn parses_am_pm() {
    let sched = parse_schedule("at 8:30 am and 6 pm").unwrap();
    assert_eq!(
        sched.times,
        vec![TimeOfDay::new(8, 30), TimeOfDay::new(18, 0)]
    );

    // 12 am is midnight, 12 pm is noon.
    let sched = parse_schedule("at 12 am, 12 pm").unwrap();
    assert_eq!(sched.times, vec![TimeOfDay::new(0, 0), TimeOfDay::new(12, 0)]);
}

#[test]
fn parses_seconds() {
    let sched = parse_schedule("at 6:30:15").unwrap();
    assert_eq!(
        sched.times,
        vec![TimeOfDay {
            hour: 6,
            minute: 30,
            second: 15,
            millisecond: 0,
        }]
    );
}

#[test]
fn parses_weekday_list() {
    let sched = parse_schedule("at 7 pm on mon, wed and fri").unwrap();
    assert_eq!(
        sched.weekdays,
        vec![Weekday::Monday, Weekday::Wednesday, Weekday::Friday]
    );
}

#[test]
fn parses_weekday_range() {
    let sched = parse_schedule("at 7 on mon through fri").unwrap();
    assert_eq!(
        sched.weekdays,
        vec![
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
        ]
    );
}

#[test]
fn weekday_range_wraps_week_end() {
    let sched = parse_schedule("at 7 on sat thru mon").unwrap();
    assert_eq!(
        sched.weekdays,
        vec![Weekday::Saturday, Weekday::Sunday, Weekday::Monday]
    );
}

#[test]
fn parses_window_dates() {
    let sched = parse_schedule("at 8:30 from 5/15 to 10/1").unwrap();
    assert_eq!(
        sched.from,
        Some(DateSpec {
            year: 0,
            month: 5,
            day: 15,
        })
    );
    assert_eq!(
        sched.to,
        Some(DateSpec {
            year: 0,
            month: 10,
            day: 1,
        })
    );
}

#[test]
fn parses_explicit_years() {
    let sched = parse_schedule("at 8:30 from 5/15/25 to 10/1/2026").unwrap();
    assert_eq!(sched.from.unwrap().year, 2025);
    assert_eq!(sched.to.unwrap().year, 2026);
}

#[test]
fn full_form_round_trips_through_evaluator() {
    let sched = parse_schedule("at 6:00 am and 8:00 pm on tue, thur from 6/1 to 6/30").unwrap();
    assert!(sched.is_armed());
    assert_eq!(sched.times.len(), 2);
    assert_eq!(sched.weekdays, vec![Weekday::Tuesday, Weekday::Thursday]);

    // 2024-06-03 is a Monday; the next Tuesday slot is June 4 at 6 am.
    let reference = chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let next = sched.next_run_after(reference).unwrap();
    assert_eq!(
        next,
        chrono::NaiveDate::from_ymd_opt(2024, 6, 4)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    );
}

#[test]
fn rejects_missing_at() {
    let err = parse_schedule("8:30").unwrap_err();
    assert_eq!(err.offset(), 0);
    assert!(err.to_string().contains("expected 'at'"));
}

#[test]
fn rejects_unknown_word_with_offset() {
    let err = parse_schedule("at 8:30 on blursday").unwrap_err();
    assert_eq!(err.offset(), 11);
    assert!(err.to_string().contains("unknown word 'blursday'"));
}

#[test]
fn rejects_out_of_range_fields() {
    assert!(parse_schedule("at 8:75").unwrap_err().to_string().contains("minute out of range"));
    assert!(parse_schedule("at 26:00").unwrap_err().to_string().contains("hour out of range"));
    assert!(parse_schedule("at 8 from 13/1").unwrap_err().to_string().contains("month out of range"));
}

#[test]
fn rejects_trailing_tokens() {
    let err = parse_schedule("at 8:30 on mon 5").unwrap_err();
    assert!(err.to_string().contains("tokens left over"));
}

#[test]
fn error_display_marks_the_span() {
    let err = parse_schedule("at 8:30 on blursday").unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown word 'blursday': 'at 8:30 on \u{00ab}blursday\u{00bb}'"
    );
}
