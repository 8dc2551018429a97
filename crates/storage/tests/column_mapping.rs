use bczd_storage::Column;

#[test]
fn columns_follow_declaration_order() {
    for (idx, column) in Column::ALL.into_iter().enumerate() {
        assert_eq!(column.index(), idx);
    }
}

#[test]
fn column_names_round_trip() {
    for column in Column::ALL {
        assert_eq!(Column::from_name(column.as_str()), Some(column));
    }
    assert_eq!(Column::from_name("blocks"), None);
}
