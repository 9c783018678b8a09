#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use indoc::indoc;
    use shapeser::*;

    fn codec() -> Codec {
        Codec::with_registry(Arc::new(Registry::new()))
    }

    #[derive(Debug, PartialEq, Shaped)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn derive_record() {
        let codec = codec();

        let p: Point = codec.read_str(Format::Json, r#"{"y": 2, "x": -1}"#).unwrap();
        assert_eq!(p, Point { x: -1, y: 2 });
        assert_eq!(codec.write_string(Format::Json, &p).unwrap(), r#"{"x":-1,"y":2}"#);
        assert_eq!(codec.write_string(Format::Yaml, &p).unwrap(), "x: -1\ny: 2");

        // Missing fields take the zero value of their shape.
        let p: Point = codec.read_str(Format::Yaml, "x: 5").unwrap();
        assert_eq!(p, Point { x: 5, y: 0 });
    }

    #[test]
    fn derive_record_descriptor() {
        let TypeDescriptor::Record(shape) = Point::descriptor() else {
            panic!("not a record: {}", Point::descriptor());
        };

        assert_eq!(shape.name, "Point");
        assert_eq!(
            shape.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        assert_eq!(
            shape.fields[0].descriptor(),
            &TypeDescriptor::Scalar(ScalarKind::Integer)
        );

        // The shape is built once.
        assert!(matches!(Point::descriptor(), TypeDescriptor::Record(s) if Arc::ptr_eq(&s, &shape)));
    }

    #[derive(Debug, PartialEq, Shaped)]
    #[shape(rename = "Settings")]
    struct Config {
        #[shape(rename = "server-name")]
        name: String,
        #[shape(default = 8080)]
        port: u16,
        #[shape(default)]
        tags: Vec<String>,
        #[shape(policy = "not_null")]
        owner: Option<String>,
        #[shape(order = 0)]
        version: u32,
        #[shape(default = "info")]
        level: String,
    }

    #[test]
    fn derive_record_attributes() {
        let codec = codec();

        let c: Config = codec
            .read_str(Format::Json, r#"{"server-name": "a", "owner": null, "version": 2}"#)
            .unwrap();
        assert_eq!(
            c,
            Config {
                name: "a".to_owned(),
                port: 8080,
                tags: vec![],
                owner: None,
                version: 2,
                level: "info".to_owned(),
            }
        );

        assert_eq!(
            codec.write_string(Format::Json, &c).unwrap(),
            r#"{"version":2,"server-name":"a","port":8080,"tags":[],"level":"info"}"#
        );

        let err = codec.read_str::<Config>(Format::Json, r#"{"name": "a"}"#).unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::UnknownProperty(ref p) if p == "name"), "{}", err);

        let TypeDescriptor::Record(shape) = Config::descriptor() else {
            panic!("not a record");
        };
        assert_eq!(shape.name, "Settings");
        assert_eq!(shape.get_field("owner").map(|f| f.policy), Some(FieldPolicy::NotNull));
    }

    #[test]
    fn derive_record_non_default_only() {
        let codec = codec().with_options(Options::NON_DEFAULT_ONLY);
        let c = Config {
            name: String::new(),
            port: 9000,
            tags: vec![],
            owner: None,
            version: 0,
            level: "info".to_owned(),
        };

        assert_eq!(codec.write_string(Format::Json, &c).unwrap(), r#"{"port":9000}"#);
    }

    #[derive(Debug, PartialEq, Shaped)]
    enum Color {
        Red,
        #[shape(rename = "green")]
        Green,
    }

    #[test]
    fn derive_enumeration() {
        let codec = codec();

        let got: Vec<Color> = codec.read_str(Format::Yaml, "[Red, green]").unwrap();
        assert_eq!(got, vec![Color::Red, Color::Green]);
        assert_eq!(codec.write_string(Format::Json, &got).unwrap(), r#"["Red","green"]"#);

        let err = codec.read_str::<Color>(Format::Yaml, "Green").unwrap_err();
        assert!(
            matches!(err.kind, ReadErrorKind::InvalidEnumValue { ref name, ref value } if name == "Color" && value == "Green"),
            "{}",
            err
        );

        // Enumerations are valid map keys.
        let m: BTreeMap<String, Color> = codec.read_str(Format::Yaml, "a: Red").unwrap();
        assert_eq!(m["a"], Color::Red);
    }

    #[derive(Debug, PartialEq, Shaped)]
    struct Circle {
        radius: f64,
    }

    #[derive(Debug, PartialEq, Shaped)]
    struct Square {
        kind: String,
        side: u32,
    }

    #[derive(Debug, PartialEq, Shaped)]
    #[shape(tag = "kind")]
    enum Figure {
        #[shape(rename = "circle")]
        Circle(Circle),
        #[shape(rename = "square")]
        Square(Square),
    }

    #[test]
    fn derive_polymorphic() {
        let codec = codec();

        let input = r#"[{"kind": "circle", "radius": 1.5}, {"kind": "square", "side": 2}]"#;
        let got: Vec<Figure> = codec.read_str(Format::Json, input).unwrap();
        assert_eq!(
            got,
            vec![
                Figure::Circle(Circle { radius: 1.5 }),
                Figure::Square(Square {
                    kind: "square".to_owned(),
                    side: 2,
                }),
            ]
        );

        assert_eq!(
            codec.write_string(Format::Json, &got).unwrap(),
            r#"[{"kind":"circle","radius":1.5},{"kind":"square","side":2}]"#
        );
        assert_eq!(
            codec.write_string(Format::Yaml, &got).unwrap(),
            indoc! {"
                - kind: circle
                  radius: 1.5
                - kind: square
                  side: 2"}
        );
    }

    #[test]
    fn derive_polymorphic_errors() {
        let codec = codec();

        let err = codec
            .read_str::<Figure>(Format::Json, r#"{"radius": 1, "kind": "circle"}"#)
            .unwrap_err();
        assert!(
            matches!(err.kind, ReadErrorKind::DiscriminatorNotFirst { ref expected, ref found } if expected == "kind" && found == "radius"),
            "{}",
            err
        );

        let err = codec
            .read_str::<Figure>(Format::Yaml, "kind: triangle\nside: 3")
            .unwrap_err();
        assert!(
            matches!(err.kind, ReadErrorKind::UnknownSubtype { ref tag, .. } if tag == "triangle"),
            "{}",
            err
        );
    }

    #[derive(Debug, PartialEq, Shaped)]
    struct Node {
        name: String,
        children: Vec<Node>,
        parent: Option<Box<Node>>,
    }

    #[test]
    fn derive_recursive() {
        let input = indoc! {"
            name: root
            children:
              - name: a
                children: []
              - name: b
        "};

        let got: Node = codec().read_str(Format::Yaml, input).unwrap();
        assert_eq!(
            got,
            Node {
                name: "root".to_owned(),
                children: vec![
                    Node {
                        name: "a".to_owned(),
                        children: vec![],
                        parent: None,
                    },
                    Node {
                        name: "b".to_owned(),
                        children: vec![],
                        parent: None,
                    },
                ],
                parent: None,
            }
        );
    }

    #[derive(Clone, Debug, PartialEq, Shaped)]
    struct User {
        #[shape(key)]
        id: u32,
        name: String,
    }

    #[test]
    fn derive_keys() {
        let codec = codec();
        let users = vec![
            User {
                id: 1,
                name: "ann".to_owned(),
            },
            User {
                id: 1,
                name: "ann".to_owned(),
            },
        ];

        let mut sink = json::JsonSink::new(String::new());
        codec
            .write(
                &mut sink,
                &users.to_value(),
                &Vec::<User>::descriptor(),
                Options::empty(),
                &mut KeyedIdentityCache::new(),
            )
            .unwrap();
        assert_eq!(sink.into_inner(), r#"[{"id":1,"name":"ann"},{"id":1}]"#);

        let input = r#"[{"id": 7, "name": "first"}, {"id": 7, "name": "second"}]"#;
        let mut tokenizer = codec.tokenizer(Format::Json, source::Cursor::from_str(input));
        let mut identity = KeyedIdentityCache::new();
        let value = codec
            .read(&mut *tokenizer, &Vec::<User>::descriptor(), Options::empty(), &mut identity)
            .unwrap();
        let got = Vec::<User>::from_value(value).unwrap();

        assert_eq!(identity.len(), 1);
        assert_eq!(got[1].name, "first");
    }

    #[derive(Debug, PartialEq, Shaped)]
    struct Blob {
        data: Bytes,
        initial: char,
        sizes: [u8; 2],
        extra: BTreeMap<u32, bool>,
    }

    #[test]
    fn derive_scalar_kinds() {
        let codec = codec();
        let input = r#"{"data": "AAEC", "initial": "x", "sizes": [1, 2], "extra": {"10": true}}"#;

        let got: Blob = codec.read_str(Format::Json, input).unwrap();
        assert_eq!(
            got,
            Blob {
                data: Bytes(vec![0, 1, 2]),
                initial: 'x',
                sizes: [1, 2],
                extra: BTreeMap::from([(10, true)]),
            }
        );
        assert_eq!(
            codec.write_string(Format::Json, &got).unwrap(),
            r#"{"data":"AAEC","initial":"x","sizes":[1,2],"extra":{"10":true}}"#
        );

        let err = codec
            .read_str::<Blob>(Format::Json, r#"{"sizes": [1, 2, 3]}"#)
            .unwrap_err();
        assert!(
            matches!(err.kind, ReadErrorKind::LengthMismatch { expected: 2, found: 3 }),
            "{}",
            err
        );

        let err = codec
            .read_str::<Blob>(Format::Json, r#"{"extra": {"x": true}}"#)
            .unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::Shape(_)), "{}", err);
    }

    mod primary {
        use shapeser::Shaped;

        #[derive(Debug, PartialEq, Shaped)]
        pub struct Endpoint {
            pub host: String,
        }
    }

    mod fallback {
        use shapeser::Shaped;

        #[derive(Debug, PartialEq, Shaped)]
        pub struct Endpoint {
            pub port: u16,
        }
    }

    #[test]
    fn derive_same_name_in_two_modules() {
        let codec = codec();

        let a: primary::Endpoint = codec.read_str(Format::Json, r#"{"host": "h"}"#).unwrap();
        assert_eq!(a, primary::Endpoint { host: "h".to_owned() });
        let b: fallback::Endpoint = codec.read_str(Format::Json, r#"{"port": 80}"#).unwrap();
        assert_eq!(b, fallback::Endpoint { port: 80 });

        assert_eq!(codec.write_string(Format::Json, &b).unwrap(), r#"{"port":80}"#);
        assert_eq!(codec.write_string(Format::Json, &a).unwrap(), r#"{"host":"h"}"#);
    }
}
