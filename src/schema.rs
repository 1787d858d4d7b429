use crate::compiled::ProgramCache;
use indexmap::IndexMap;
use std::sync::Arc;

/// Declared members of an object node, in declaration order.
pub type Fields = IndexMap<String, SchemaField>;

/// One node of a schema tree.
///
/// The variant is fixed at construction; [`nullable`][`SchemaField::nullable`]
/// and [`optional`][`SchemaField::optional`] return new values and never
/// change the variant.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaField {
    String(Leaf),
    Number(Leaf),
    Object(ObjectField),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Leaf {
    pub nullable: bool,
    pub optional: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectField {
    pub fields: Arc<Fields>,
    pub nullable: bool,
    pub optional: bool,
}

/// Constructs a string leaf.
pub fn string() -> SchemaField {
    SchemaField::String(Leaf::default())
}

/// Constructs a number leaf.
pub fn number() -> SchemaField {
    SchemaField::Number(Leaf::default())
}

/// Constructs an object node from `(name, field)` pairs.
///
/// If a name repeats, the last field given for it wins.
pub fn object<I, K>(fields: I) -> SchemaField
where
    I: IntoIterator<Item = (K, SchemaField)>,
    K: Into<String>,
{
    SchemaField::Object(ObjectField::new(fields))
}

impl ObjectField {
    pub fn new<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaField)>,
        K: Into<String>,
    {
        Self {
            fields: Arc::new(
                fields
                    .into_iter()
                    .map(|(name, field)| (name.into(), field))
                    .collect(),
            ),
            nullable: false,
            optional: false,
        }
    }
}

impl SchemaField {
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::String(leaf) | Self::Number(leaf) => leaf.nullable,
            Self::Object(object) => object.nullable,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Self::String(leaf) | Self::Number(leaf) => leaf.optional,
            Self::Object(object) => object.optional,
        }
    }

    /// Returns a copy of this field that also accepts `null`.
    ///
    /// Nested fields are shared with `self`, not cloned.
    pub fn nullable(&self) -> Self {
        let mut out = self.clone();
        match &mut out {
            Self::String(leaf) | Self::Number(leaf) => leaf.nullable = true,
            Self::Object(object) => object.nullable = true,
        }
        out
    }

    /// Returns a copy of this field that may be missing from its parent object.
    pub fn optional(&self) -> Self {
        let mut out = self.clone();
        match &mut out {
            Self::String(leaf) | Self::Number(leaf) => leaf.optional = true,
            Self::Object(object) => object.optional = true,
        }
        out
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Object(_) => "object",
        }
    }
}

/// The root of a schema tree: an object node that validators are built from.
///
/// Each `Schema` value owns the cache its compiled programs are stored in.
/// Clones share that cache; [`nullable`][`Schema::nullable`] and
/// [`optional`][`Schema::optional`] start a new one.
#[derive(Clone, Debug)]
pub struct Schema {
    object: ObjectField,
    programs: Arc<ProgramCache>,
}

impl Schema {
    pub fn new<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaField)>,
        K: Into<String>,
    {
        ObjectField::new(fields).into()
    }

    pub fn object(&self) -> &ObjectField {
        &self.object
    }

    pub fn fields(&self) -> &Fields {
        &self.object.fields
    }

    pub fn is_nullable(&self) -> bool {
        self.object.nullable
    }

    pub fn is_optional(&self) -> bool {
        self.object.optional
    }

    pub fn nullable(&self) -> Self {
        ObjectField {
            nullable: true,
            ..self.object.clone()
        }
        .into()
    }

    pub fn optional(&self) -> Self {
        ObjectField {
            optional: true,
            ..self.object.clone()
        }
        .into()
    }

    pub(crate) fn programs(&self) -> &ProgramCache {
        &self.programs
    }
}

impl From<ObjectField> for Schema {
    fn from(object: ObjectField) -> Self {
        Self {
            object,
            programs: Arc::default(),
        }
    }
}

impl From<Schema> for SchemaField {
    fn from(schema: Schema) -> Self {
        SchemaField::Object(schema.object)
    }
}

impl From<&Schema> for SchemaField {
    fn from(schema: &Schema) -> Self {
        SchemaField::Object(schema.object.clone())
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}
