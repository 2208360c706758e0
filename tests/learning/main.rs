use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

#[test]
fn quick_xml_escapes_markup() {
    let escaped = escape(b"Survey <1> & \"2\"");

    assert_eq!(
        std::str::from_utf8(&escaped).unwrap(),
        "Survey &lt;1&gt; &amp; &quot;2&quot;"
    );
}

#[test]
fn quick_xml_local_name_ignores_prefix() {
    let mut reader = Reader::from_str("<gmd:fileIdentifier>id</gmd:fileIdentifier>");
    let mut buffer = Vec::new();

    match reader.read_event(&mut buffer).unwrap() {
        Event::Start(ref e) => {
            assert_eq!(e.name(), b"gmd:fileIdentifier");
            assert_eq!(e.local_name(), b"fileIdentifier");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "Beginning Time")]
    beginning_time: String,
    #[serde(default)]
    title: String,
}

#[test]
fn csv_trims_headers_and_fields() {
    let data = " Beginning Time , title \n 2001-05-01 , Gravity \n";
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let rows: Vec<Row> = reader.deserialize().collect::<Result<_, _>>().unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].beginning_time, "2001-05-01");
    assert_eq!(rows[0].title, "Gravity");
}

#[test]
fn csv_missing_column_uses_default() {
    let data = "Beginning Time\n2001\n";
    let mut reader = csv::Reader::from_reader(data.as_bytes());

    let rows: Vec<Row> = reader.deserialize().collect::<Result<_, _>>().unwrap();

    assert_eq!(rows[0].title, "");
}
