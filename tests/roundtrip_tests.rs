// End-to-end round-trip tests: write rows, read them back, compare.

use orcfile::meta::ColumnEncodingKind;
use orcfile::{
    CompressionKind, Decimal, Reader, StreamKind, Timestamp, TypeDescription, Value, Writer,
    WriterOptions,
};

fn write_rows(
    schema: &TypeDescription,
    rows: &[Vec<Value>],
    options: WriterOptions,
) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut writer = Writer::new(&mut buf, schema, options).unwrap();
    for row in rows {
        writer.write_row(row).unwrap();
    }
    writer.close().unwrap();
    buf
}

fn read_rows(buf: Vec<u8>, columns: &[&str]) -> Vec<Vec<Value>> {
    let reader = Reader::new(buf).unwrap();
    let mut cursor = reader.select(columns).unwrap();
    let mut rows = Vec::new();
    while cursor.stripes() {
        while cursor.next() {
            rows.push(cursor.row().to_vec());
        }
    }
    assert!(cursor.err().is_none(), "cursor error: {:?}", cursor.err());
    rows
}

#[test]
fn test_e2e_scalar_round_trip() {
    let schema = TypeDescription::from_str(
        "struct<b:boolean,t:tinyint,s:smallint,i:int,l:bigint,f:float,d:double,\
         str:string,bin:binary,dec:decimal(18,2),dt:date,ts:timestamp>",
    )
    .unwrap();
    let rows: Vec<Vec<Value>> = (0..100)
        .map(|i| {
            vec![
                Value::Boolean(i % 2 == 0),
                Value::Byte((i % 100) as i8),
                Value::Int(i * 10),
                Value::Int(i * 1000),
                Value::Int(i * 1_000_000),
                Value::Float(i as f32 / 4.0),
                Value::Double(i as f64 / 8.0),
                Value::String(format!("row-{}", i)),
                Value::Binary(vec![i as u8, 0xff, 0x00]),
                Value::Decimal(Decimal::new(i as i128 * 100 + 25, 2)),
                Value::Date(18_000 + i as i32),
                Value::Timestamp(Timestamp::new(1_478_123_411 + i, (i as u32 * 1000) % 1_000_000_000)),
            ]
        })
        .collect();

    let buf = write_rows(&schema, &rows, WriterOptions::default());
    let got = read_rows(
        buf,
        &["b", "t", "s", "i", "l", "f", "d", "str", "bin", "dec", "dt", "ts"],
    );
    assert_eq!(got, rows);
}

#[test]
fn test_e2e_round_trip_with_nulls() {
    let schema =
        TypeDescription::from_str("struct<a:bigint,b:string,c:double>").unwrap();
    let rows: Vec<Vec<Value>> = (0..1000)
        .map(|i| {
            vec![
                if i % 3 == 0 { Value::Null } else { Value::Int(i) },
                if i % 5 == 0 { Value::Null } else { Value::String(format!("v{}", i % 7)) },
                if i % 2 == 0 { Value::Null } else { Value::Double(i as f64) },
            ]
        })
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    assert_eq!(read_rows(buf, &["a", "b", "c"]), rows);
}

#[test]
fn test_e2e_write_all_nil_row() {
    let schema = TypeDescription::from_str(
        "struct<string1:string,int1:bigint,double1:double,timestamp1:timestamp,boolean1:boolean>",
    )
    .unwrap();
    let row = vec![Value::Null, Value::Null, Value::Null, Value::Null, Value::Null];
    let buf = write_rows(&schema, std::slice::from_ref(&row), WriterOptions::default());
    let got = read_rows(buf, &["string1", "int1", "double1", "timestamp1", "boolean1"]);
    assert_eq!(got, vec![row]);
}

#[test]
fn test_e2e_round_trip_zlib() {
    let schema = TypeDescription::from_str("struct<a:bigint,b:string>").unwrap();
    let rows: Vec<Vec<Value>> = (0..10_001)
        .map(|i| vec![Value::Int(i % 9973), Value::String(format!("{:x}", i % 1000))])
        .collect();
    let options = WriterOptions::default().compression(CompressionKind::Zlib);
    let buf = write_rows(&schema, &rows, options);
    let reader = Reader::new(buf.clone()).unwrap();
    assert_eq!(reader.compression(), CompressionKind::Zlib);
    assert_eq!(read_rows(buf, &["a", "b"]), rows);
}

#[test]
fn test_e2e_round_trip_snappy() {
    let schema = TypeDescription::from_str("struct<a:bigint>").unwrap();
    let rows: Vec<Vec<Value>> = (0..5000).map(|i| vec![Value::Int(i * 3)]).collect();
    let options = WriterOptions::default().compression(CompressionKind::Snappy);
    let buf = write_rows(&schema, &rows, options);
    assert_eq!(read_rows(buf, &["a"]), rows);
}

#[test]
fn test_e2e_small_compression_chunks() {
    // A tiny block size forces many chunks per stream.
    let schema = TypeDescription::from_str("struct<a:bigint,b:string>").unwrap();
    let rows: Vec<Vec<Value>> = (0..2000)
        .map(|i| vec![Value::Int(i), Value::String(format!("value-{}", i))])
        .collect();
    let options = WriterOptions::default()
        .compression(CompressionKind::Zlib)
        .compression_block_size(64);
    let buf = write_rows(&schema, &rows, options);
    assert_eq!(read_rows(buf, &["a", "b"]), rows);
}

#[test]
fn test_e2e_nested_round_trip() {
    let schema = TypeDescription::from_str(
        "struct<tags:array<string>,attrs:map<string,bigint>,nested:struct<x:double,y:array<bigint>>,\
         u:uniontype<bigint,string>>",
    )
    .unwrap();
    let rows: Vec<Vec<Value>> = (0..500)
        .map(|i| {
            vec![
                if i % 11 == 0 {
                    Value::Null
                } else {
                    Value::List((0..i % 4).map(|j| Value::String(format!("t{}", j))).collect())
                },
                Value::Map(vec![
                    (Value::String("a".into()), Value::Int(i)),
                    (Value::String("b".into()), Value::Int(i * 2)),
                ]),
                if i % 7 == 0 {
                    Value::Null
                } else {
                    Value::Struct(vec![
                        Value::Double(i as f64 / 2.0),
                        Value::List(vec![Value::Int(i), Value::Null]),
                    ])
                },
                if i % 2 == 0 {
                    Value::Union(0, Box::new(Value::Int(i)))
                } else {
                    Value::Union(1, Box::new(Value::String(format!("u{}", i))))
                },
            ]
        })
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    assert_eq!(read_rows(buf, &["tags", "attrs", "nested", "u"]), rows);
}

#[test]
fn test_e2e_multiple_stripes_preserve_order() {
    let schema = TypeDescription::from_str("struct<a:bigint,b:string>").unwrap();
    let rows: Vec<Vec<Value>> = (0..20_000)
        .map(|i| vec![Value::Int(i), Value::String(format!("{:06}", i))])
        .collect();
    // A tiny stripe size forces several stripes.
    let options = WriterOptions::default().stripe_size(64 * 1024).row_index_stride(1000);
    let buf = write_rows(&schema, &rows, options);

    let reader = Reader::new(buf.clone()).unwrap();
    assert!(reader.num_stripes() > 1, "expected multiple stripes");
    assert_eq!(reader.num_rows(), 20_000);
    let total: u64 = (0..reader.num_stripes())
        .map(|i| reader.stripe_info(i).unwrap().number_of_rows)
        .sum();
    assert_eq!(total, 20_000);

    assert_eq!(read_rows(buf, &["a", "b"]), rows);
}

#[test]
fn test_e2e_column_projection() {
    let schema = TypeDescription::from_str("struct<a:bigint,b:string,c:double>").unwrap();
    let rows: Vec<Vec<Value>> = (0..100)
        .map(|i| vec![Value::Int(i), Value::String(format!("{}", i)), Value::Double(i as f64)])
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    let got = read_rows(buf, &["c", "a"]);
    for (i, row) in got.iter().enumerate() {
        assert_eq!(row[0], Value::Double(i as f64));
        assert_eq!(row[1], Value::Int(i as i64));
    }
}

#[test]
fn test_e2e_select_missing_column() {
    let schema = TypeDescription::from_str("struct<a:bigint>").unwrap();
    let buf = write_rows(&schema, &[vec![Value::Int(1)]], WriterOptions::default());
    let reader = Reader::new(buf).unwrap();
    assert!(matches!(
        reader.select(&["nope"]),
        Err(orcfile::Error::SchemaMismatch(_))
    ));
}

#[test]
fn test_e2e_present_stream_suppressed_without_nulls() {
    let schema = TypeDescription::from_str("struct<clean:bigint,holey:bigint>").unwrap();
    let rows: Vec<Vec<Value>> = (0..100)
        .map(|i| {
            vec![
                Value::Int(i),
                if i % 4 == 0 { Value::Null } else { Value::Int(i) },
            ]
        })
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());

    let reader = Reader::new(buf).unwrap();
    let footer = reader.stripe_footer(0).unwrap();
    let clean_id = 1;
    let holey_id = 2;
    let has_present = |column: usize| {
        footer
            .streams
            .iter()
            .any(|s| s.id.column == column && s.id.kind == StreamKind::Present)
    };
    assert!(!has_present(clean_id), "no-null column must omit Present");
    assert!(has_present(holey_id), "nullable column must emit Present");
}

#[test]
fn test_e2e_dictionary_encoding_chosen_for_low_cardinality() {
    let schema = TypeDescription::from_str("struct<s:string>").unwrap();
    let rows: Vec<Vec<Value>> = (0..1000)
        .map(|i| vec![Value::String(format!("key{}", i % 5))])
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    let reader = Reader::new(buf.clone()).unwrap();
    let footer = reader.stripe_footer(0).unwrap();
    assert_eq!(footer.columns[1].kind, ColumnEncodingKind::DictionaryV2);
    assert_eq!(footer.columns[1].dictionary_size, 5);
    // Dictionary entries are sorted, so the column also carries its
    // DictionaryData stream.
    assert!(footer
        .streams
        .iter()
        .any(|s| s.id.column == 1 && s.id.kind == StreamKind::DictionaryData));
    assert_eq!(read_rows(buf, &["s"]), rows);
}

#[test]
fn test_e2e_direct_encoding_chosen_for_high_cardinality() {
    let schema = TypeDescription::from_str("struct<s:string>").unwrap();
    let rows: Vec<Vec<Value>> = (0..1000)
        .map(|i| vec![Value::String(format!("unique-{}", i))])
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    let reader = Reader::new(buf.clone()).unwrap();
    let footer = reader.stripe_footer(0).unwrap();
    assert_eq!(footer.columns[1].kind, ColumnEncodingKind::DirectV2);
    assert_eq!(read_rows(buf, &["s"]), rows);
}

#[test]
fn test_e2e_dictionary_with_nulls() {
    let schema = TypeDescription::from_str("struct<s:string>").unwrap();
    let rows: Vec<Vec<Value>> = (0..1000)
        .map(|i| {
            vec![if i % 10 == 0 {
                Value::Null
            } else {
                Value::String(format!("k{}", i % 3))
            }]
        })
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    assert_eq!(read_rows(buf, &["s"]), rows);
}

#[test]
fn test_e2e_timestamp_nanos_survive() {
    let schema = TypeDescription::from_str("struct<ts:timestamp>").unwrap();
    let cases = [
        Timestamp::new(1_478_123_411, 99),
        Timestamp::new(1_478_123_411, 0),
        Timestamp::new(1_478_123_411, 1000),
        Timestamp::new(1_478_123_411, 100_000),
        Timestamp::new(1_478_123_411, 999_999_999),
        Timestamp::new(1_420_070_400, 500_000_000),
        // Before the ORC epoch.
        Timestamp::new(1_000_000_000, 10_001),
    ];
    let rows: Vec<Vec<Value>> =
        cases.iter().map(|ts| vec![Value::Timestamp(*ts)]).collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    assert_eq!(read_rows(buf, &["ts"]), rows);
}

#[test]
fn test_e2e_char_varchar_round_trip() {
    let schema =
        TypeDescription::from_str("struct<c:char(3),v:varchar(10)>").unwrap();
    let rows: Vec<Vec<Value>> = (0..50)
        .map(|i| {
            vec![
                Value::String(format!("{:03}", i)),
                Value::String(format!("v{}", i)),
            ]
        })
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    assert_eq!(read_rows(buf, &["c", "v"]), rows);
}

#[test]
fn test_e2e_empty_file() {
    let schema = TypeDescription::from_str("struct<a:bigint>").unwrap();
    let buf = write_rows(&schema, &[], WriterOptions::default());
    let reader = Reader::new(buf).unwrap();
    assert_eq!(reader.num_rows(), 0);
    assert_eq!(reader.num_stripes(), 0);
    let mut cursor = reader.select(&["a"]).unwrap();
    assert!(!cursor.stripes());
    assert!(cursor.err().is_none());
}

#[test]
fn test_e2e_schema_survives() {
    let text = "struct<a:bigint,b:map<string,double>,c:decimal(12,4)>";
    let schema = TypeDescription::from_str(text).unwrap();
    let buf = write_rows(&schema, &[], WriterOptions::default());
    let reader = Reader::new(buf).unwrap();
    assert_eq!(reader.schema().unwrap().to_string(), text);
}

#[test]
fn test_e2e_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.orc");
    let schema = TypeDescription::from_str("struct<a:bigint,b:string>").unwrap();

    let file = std::fs::File::create(&path).unwrap();
    let mut writer = Writer::new(file, &schema, WriterOptions::default()).unwrap();
    let mut sum = 0i64;
    for i in 0..1000i64 {
        writer.write_row(&[Value::Int(i), Value::String(format!("{:x}", i))]).unwrap();
        sum += i;
    }
    writer.close().unwrap();

    let reader = Reader::open(&path).unwrap();
    let mut cursor = reader.select(&["a"]).unwrap();
    let mut got = 0i64;
    let mut rows = 0;
    while cursor.stripes() {
        while cursor.next() {
            got += cursor.row()[0].as_int().unwrap();
            rows += 1;
        }
    }
    assert!(cursor.err().is_none());
    assert_eq!(rows, 1000);
    assert_eq!(got, sum);
}

#[test]
fn test_e2e_corrupt_magic_rejected() {
    let schema = TypeDescription::from_str("struct<a:bigint>").unwrap();
    let mut buf = write_rows(&schema, &[vec![Value::Int(1)]], WriterOptions::default());
    buf[0] = b'X';
    assert!(matches!(Reader::new(buf), Err(orcfile::Error::Corrupt(_))));
}

#[test]
fn test_e2e_truncated_tail_rejected() {
    let schema = TypeDescription::from_str("struct<a:bigint>").unwrap();
    let buf = write_rows(&schema, &[vec![Value::Int(1)]], WriterOptions::default());
    let truncated = buf[..buf.len() - 4].to_vec();
    assert!(Reader::new(truncated).is_err());
}

#[test]
fn test_e2e_random_ints_round_trip() {
    use rand::Rng;
    let mut rng = rand::rng();
    let schema = TypeDescription::from_str("struct<a:bigint>").unwrap();
    let rows: Vec<Vec<Value>> = (0..50_000)
        .map(|_| vec![Value::Int(rng.random_range(-1_000_000..1_000_000))])
        .collect();
    let buf = write_rows(&schema, &rows, WriterOptions::default());
    assert_eq!(read_rows(buf, &["a"]), rows);
}
