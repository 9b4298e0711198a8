// Contract tests for the public API: round-trip law, mutation discipline,
// and corrupt-input rejection.
use tabulite::api::{
    load_file, save_file, Error, ErrorKind, ExportOptions, Table, TableEncoding,
};

fn people_table() -> Table {
    let mut table = Table::new(TableEncoding::utf8());
    table.add_character_field("NAME", 12).expect("name");
    table.add_numeric_field("BALANCE", 8, 2).expect("balance");
    table.add_date_field("JOINED").expect("joined");
    table.add_logical_field("ACTIVE").expect("active");
    table.append_blank_record().expect("row 0");
    table.set_value(0, 0, "Curie").expect("set");
    table.set_value(0, 1, "1903.11").expect("set");
    table.set_value(0, 2, "19030610").expect("set");
    table.set_value(0, 3, "T").expect("set");
    table.append_blank_record().expect("row 1");
    table.set_value(1, 0, "Meitner").expect("set");
    table
}

#[test]
fn save_load_save_is_byte_exact() {
    let table = people_table();
    let first = table.to_bytes();
    let reloaded = Table::from_bytes(&first, TableEncoding::utf8()).expect("load");
    assert_eq!(reloaded.to_bytes(), first);
}

#[test]
fn file_round_trip_through_the_fs_shim() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("people.dbf");
    let table = people_table();
    save_file(&table, &path).expect("save");

    let reloaded = load_file(&path, "utf-8").expect("load");
    assert_eq!(reloaded.to_bytes(), table.to_bytes());
    assert_eq!(reloaded.value(0, 2).expect("joined"), "19030610");
    assert_eq!(reloaded.value(1, 1).expect("blank balance"), "");
}

#[test]
fn mark_deleted_changes_exactly_one_byte() {
    let mut table = people_table();
    let before = table.to_bytes();
    table.set_deleted(1, true).expect("delete");
    let after = table.to_bytes();

    let diffs = before
        .iter()
        .zip(after.iter())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    let record_region = before.len() - 2 * table.record_width();
    assert_eq!(diffs, vec![record_region + table.record_width()]);
    assert_eq!(after[diffs[0]], b'*');
}

#[test]
fn numeric_width_scenario_matches_the_format_rules() {
    let mut table = Table::new(TableEncoding::utf8());
    table.add_numeric_field("AMT", 5, 2).expect("field");
    table.append_blank_record().expect("row");

    let err = table.set_value(0, 0, "12.345").expect_err("needs 6 bytes");
    assert_eq!(err.kind(), ErrorKind::ValueTooLong);

    table.set_value(0, 0, "1.23").expect("fits");
    let bytes = table.to_bytes();
    let slot = &bytes[bytes.len() - 5..];
    assert_eq!(slot, b" 1.23");
}

#[test]
fn truncated_files_are_rejected_not_repaired() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("broken.dbf");
    let table = people_table();
    let mut bytes = table.to_bytes();
    bytes.truncate(bytes.len() - 7);
    std::fs::write(&path, &bytes).expect("write");

    let err: Error = load_file(&path, "utf-8").expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::CorruptHeader);
}

#[test]
fn cp866_text_survives_the_full_cycle() {
    let ibm866 = TableEncoding::resolve("ibm866").expect("ibm866");
    let mut table = Table::new(ibm866);
    table.add_character_field("GOROD", 12).expect("field");
    table.append_blank_record().expect("row");
    table.set_value(0, 0, "Москва").expect("set");

    let bytes = table.to_bytes();
    let reloaded = Table::from_bytes(&bytes, ibm866).expect("load");
    assert_eq!(reloaded.value(0, 0).expect("city"), "Москва");
}

#[test]
fn export_consumes_only_public_accessors() {
    let table = people_table();
    let text =
        tabulite::api::delimited_string(&table, &ExportOptions::default()).expect("export");
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "NAME,BALANCE,JOINED,ACTIVE");
    assert_eq!(lines[1], "Curie,1903.11,19030610,T");
    assert_eq!(lines[2], "Meitner,,,");
}
