use proc_macro::TokenStream;
use quote::quote;
use syn::{parse::Parser, parse_macro_input, Data, DataStruct, DeriveInput, Fields, Meta};

/// 生成 Model trait 的实现
///
/// 自动生成 `MODEL`、`TABLE` 和 `PRIMARY_KEY` 常量
///
/// 使用示例：
/// ```ignore
/// // 单列主键（默认 "id"）
/// #[derive(ModelMeta)]
/// #[model(table = "users")]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// // 复合主键，按逗号分隔
/// #[derive(ModelMeta)]
/// #[model(table = "memberships", pk = "org_id, user_id")]
/// struct Membership {
///     org_id: i64,
///     user_id: i64,
///     role: String,
/// }
/// ```
#[proc_macro_derive(ModelMeta, attributes(model, column))]
pub fn derive_model_meta(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let attrs = match ModelAttrs::parse(&input) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    // 如果没有指定表名，使用结构体名称的小写蛇形命名方式
    let table = attrs.table.unwrap_or_else(|| to_snake_case(&name.to_string()));

    // 如果没有指定主键，默认使用 "id"
    let pk: Vec<String> = attrs
        .pk
        .map(|pk| {
            pk.split(',')
                .map(|column| column.trim().to_string())
                .filter(|column| !column.is_empty())
                .collect()
        })
        .unwrap_or_else(|| vec!["id".to_string()]);

    if pk.is_empty() {
        return syn::Error::new_spanned(name, "#[model(pk = \"...\")] must name at least one column")
            .to_compile_error()
            .into();
    }

    let expanded = quote! {
        impl sqlxcrud::Model for #name {
            const MODEL: &'static str = stringify!(#name);
            const TABLE: &'static str = #table;
            const PRIMARY_KEY: &'static [&'static str] = &[#(#pk),*];
        }
    };

    TokenStream::from(expanded)
}

/// 生成 IntoRecord 与 Crud trait 的实现
///
/// 每个字段按声明顺序写入一列，列名默认为字段名。
/// `Option<T>` 字段为 `None` 时写入 NULL。
///
/// 使用示例：
/// ```ignore
/// #[derive(CRUD, ModelMeta)]
/// #[model(table = "users", pk = "id")]
/// struct User {
///     id: Option<i64>,
///     #[column(name = "user_name")]
///     name: String,
///     #[column(skip)]
///     cached_score: u64,
/// }
/// ```
#[proc_macro_derive(CRUD, attributes(model, column))]
pub fn derive_crud(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    // 获取字段列表（必须是具名字段的结构体）
    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return syn::Error::new_spanned(
                name,
                "CRUD derive only supports structs with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut field_names: Vec<&syn::Ident> = Vec::new();
    let mut field_columns: Vec<syn::LitStr> = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let column = match ColumnAttrs::parse(field) {
            Ok(column) => column,
            Err(err) => return err.to_compile_error().into(),
        };
        if column.skip {
            continue;
        }
        let column_name = column.name.unwrap_or_else(|| field_name.to_string());
        field_names.push(field_name);
        field_columns.push(syn::LitStr::new(&column_name, proc_macro2::Span::call_site()));
    }

    let expanded = quote! {
        impl sqlxcrud::IntoRecord for #name {
            fn to_record(&self) -> sqlxcrud::Record {
                let mut record = sqlxcrud::Record::new();
                #(
                    record.insert(#field_columns, sqlxcrud::BindValue::from(self.#field_names.clone()));
                )*
                record
            }
        }

        impl sqlxcrud::Crud for #name {}
    };

    TokenStream::from(expanded)
}

/// `#[model(...)]` 上的参数
#[derive(Default)]
struct ModelAttrs {
    table: Option<String>,
    pk: Option<String>,
}

impl ModelAttrs {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut attrs = ModelAttrs::default();
        for attr in &input.attrs {
            if !attr.path().is_ident("model") {
                continue;
            }
            let Meta::List(list) = &attr.meta else {
                return Err(syn::Error::new_spanned(attr, "expected #[model(...)]"));
            };
            let parser = syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated;
            for meta in parser.parse2(list.tokens.clone())? {
                let nv = match meta {
                    Meta::NameValue(nv) => nv,
                    other => {
                        return Err(syn::Error::new_spanned(other, "expected `key = \"value\"`"));
                    }
                };
                let value = lit_str(&nv.value)?;
                if nv.path.is_ident("table") {
                    attrs.table = Some(value);
                } else if nv.path.is_ident("pk") {
                    attrs.pk = Some(value);
                } else {
                    return Err(syn::Error::new_spanned(nv.path, "unknown model attribute"));
                }
            }
        }
        Ok(attrs)
    }
}

/// 字段上的 `#[column(name = "...", skip)]`
#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    skip: bool,
}

impl ColumnAttrs {
    fn parse(field: &syn::Field) -> syn::Result<Self> {
        let mut column = ColumnAttrs::default();
        for attr in &field.attrs {
            if !attr.path().is_ident("column") {
                continue;
            }
            let Meta::List(list) = &attr.meta else {
                return Err(syn::Error::new_spanned(attr, "expected #[column(...)]"));
            };
            let parser = syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated;
            for meta in parser.parse2(list.tokens.clone())? {
                match meta {
                    Meta::Path(path) if path.is_ident("skip") => column.skip = true,
                    Meta::NameValue(nv) if nv.path.is_ident("name") => {
                        column.name = Some(lit_str(&nv.value)?);
                    }
                    other => {
                        return Err(syn::Error::new_spanned(other, "unknown column attribute"));
                    }
                }
            }
        }
        Ok(column)
    }
}

fn lit_str(expr: &syn::Expr) -> syn::Result<String> {
    if let syn::Expr::Lit(syn::ExprLit {
        lit: syn::Lit::Str(s),
        ..
    }) = expr
    {
        Ok(s.value())
    } else {
        Err(syn::Error::new_spanned(expr, "expected a string literal"))
    }
}

/// 将 PascalCase 转换为 snake_case
fn to_snake_case(ident: &str) -> String {
    let mut result = String::new();
    for (i, c) in ident.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            result.push('_');
        }
        result.push(c.to_ascii_lowercase());
    }
    result
}
