use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    parse_macro_input, Expr, ExprArray, ExprLit, FnArg, GenericArgument, Ident, ItemFn, Lit,
    LitStr, Meta, Pat, PathArguments, Type, TypePath,
};

/// Turns an async handler function into a command declaration.
///
/// # Usage
///
/// ```ignore
/// /// Remove a user from the channel
/// #[command(aliases = ["k", "boot"], require_all = [Perm::Kick])]
/// async fn kick(
///     ctl: CommandController<Perm>,
///     user: String,
///     #[optional] #[default("no reason given".to_string())] reason: String,
/// ) -> Result<(), MessengerError> {
///     ctl.respond(&format!("Kicked {user}: {reason}")).await
/// }
/// ```
///
/// The function stays as written and a sibling is generated:
///
/// ```ignore
/// fn kick_command() -> herald::HandlerDecl {
///     herald::HandlerDecl::new("kick")
///         .controller::<CommandController<Perm>>()
///         .aliases(["k", "boot"])
///         .description("Remove a user from the channel")
///         .param(herald::ParamDecl::new("user", herald::DeclaredType::of::<String>()))
///         .param(/* reason */)
///         .require(herald::PermissionRequirement::all(vec![Perm::Kick]))
///         .handler(/* builds the controller, reads the arguments, calls kick */)
/// }
/// ```
///
/// Attribute keys: `name`, `aliases`, `description` (defaults to the doc
/// comment), and one of `require_all` / `require_any`.
///
/// The first parameter is the controller and must implement
/// `herald::FromInvocation`. Every other parameter becomes an argument:
/// `Option<T>` is an optional argument of type `T`; `#[optional]` marks a
/// plain `T` optional (it then needs `T: Default` or a `#[default(expr)]`);
/// `#[default(expr)]` supplies the value used when the argument is omitted.
/// Argument types must be `Clone + Send + Sync + 'static`.
#[proc_macro_attribute]
pub fn command(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = CommandArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);

    let func = parse_macro_input!(item as ItemFn);
    expand(args, func)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Parsed `#[command(...)]` arguments
#[derive(Default)]
struct CommandArgs {
    name: Option<LitStr>,
    aliases: Vec<LitStr>,
    description: Option<LitStr>,
    requirement: Option<(Ident, ExprArray)>,
}

impl CommandArgs {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("aliases") {
            let array: ExprArray = meta.value()?.parse()?;
            for elem in array.elems {
                match elem {
                    Expr::Lit(ExprLit {
                        lit: Lit::Str(alias),
                        ..
                    }) => self.aliases.push(alias),
                    other => {
                        return Err(syn::Error::new_spanned(other, "aliases must be string literals"))
                    }
                }
            }
        } else if meta.path.is_ident("description") {
            self.description = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("require_all") || meta.path.is_ident("require_any") {
            if self.requirement.is_some() {
                return Err(meta.error("only one of require_all and require_any may be given"));
            }
            let ctor = if meta.path.is_ident("require_all") {
                format_ident!("all")
            } else {
                format_ident!("any")
            };
            self.requirement = Some((ctor, meta.value()?.parse()?));
        } else {
            return Err(meta.error(
                "unsupported command attribute; expected name, aliases, description, require_all or require_any",
            ));
        }
        Ok(())
    }
}

/// One handler parameter after the controller
struct ArgumentParam {
    name: String,
    ty: Type,
    optional: bool,
    default: Option<Expr>,
}

fn expand(args: CommandArgs, mut func: ItemFn) -> syn::Result<TokenStream2> {
    if func.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            func.sig.fn_token,
            "#[command] handlers must be `async fn`",
        ));
    }
    if !func.sig.generics.params.is_empty() || func.sig.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "#[command] handlers cannot be generic",
        ));
    }

    let mut inputs = func.sig.inputs.iter_mut();
    let controller = match inputs.next() {
        Some(FnArg::Typed(pat_type)) => (*pat_type.ty).clone(),
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new_spanned(
                receiver,
                "#[command] handlers cannot take `self`",
            ))
        }
        None => {
            return Err(syn::Error::new(
                func.sig.ident.span(),
                "the first parameter of a #[command] handler must be its controller",
            ))
        }
    };

    let mut params = Vec::new();
    for input in inputs {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new_spanned(input, "unexpected receiver"));
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_type.pat,
                "command arguments must be plain identifiers",
            ));
        };

        let mut optional = false;
        let mut default = None;
        let mut kept = Vec::with_capacity(pat_type.attrs.len());
        for attr in pat_type.attrs.drain(..) {
            if attr.path().is_ident("optional") {
                attr.meta.require_path_only()?;
                optional = true;
            } else if attr.path().is_ident("default") {
                default = Some(attr.parse_args::<Expr>()?);
            } else {
                kept.push(attr);
            }
        }
        pat_type.attrs = kept;

        params.push(ArgumentParam {
            name: pat_ident.ident.unraw().to_string(),
            ty: (*pat_type.ty).clone(),
            optional,
            default,
        });
    }

    let fn_ident = func.sig.ident.clone();
    let builder_ident = format_ident!("{}_command", fn_ident);
    let vis = &func.vis;
    let ident_str = fn_ident.unraw().to_string();

    let name = args.name.map(|name| quote!(.name(#name)));
    let aliases = (!args.aliases.is_empty()).then(|| {
        let aliases = &args.aliases;
        quote!(.aliases([#(#aliases),*]))
    });
    let description = args
        .description
        .map(|lit| lit.value())
        .or_else(|| doc_description(&func))
        .map(|text| quote!(.description(#text)));
    let requirement = args.requirement.map(|(ctor, array)| {
        let elems = array.elems.iter();
        quote!(.require(::herald::PermissionRequirement::#ctor(::std::vec![#(#elems),*])))
    });

    let param_decls = params.iter().map(param_decl);
    let arg_idents: Vec<Ident> = (0..params.len())
        .map(|index| format_ident!("__arg{}", index))
        .collect();
    let bindings = params
        .iter()
        .zip(&arg_idents)
        .enumerate()
        .map(|(index, (param, ident))| argument_binding(index, param, ident));

    let builder_doc = format!("Declaration of the `{ident_str}` command handler.");

    Ok(quote! {
        #func

        #[doc = #builder_doc]
        #vis fn #builder_ident() -> ::herald::HandlerDecl {
            ::herald::HandlerDecl::new(#ident_str)
                .controller::<#controller>()
                #name
                #aliases
                #description
                #(#param_decls)*
                #requirement
                .handler(|__invocation: ::herald::Invocation| async move {
                    let __controller =
                        match <#controller as ::herald::FromInvocation>::from_invocation(&__invocation) {
                            ::core::result::Result::Ok(controller) => controller,
                            ::core::result::Result::Err(err) => return ::core::result::Result::Err(err),
                        };
                    #(#bindings)*
                    ::herald::IntoHandlerResult::into_handler_result(
                        #fn_ident(__controller #(, #arg_idents)*).await,
                    )
                })
        }
    })
}

/// `.param(...)` call for one argument
fn param_decl(param: &ArgumentParam) -> TokenStream2 {
    let name = &param.name;

    if let Some(inner) = option_inner(&param.ty) {
        let default = param
            .default
            .as_ref()
            .map(|expr| quote!(.default::<#inner>(#expr)));
        return quote! {
            .param(::herald::ParamDecl::new(#name, ::herald::DeclaredType::nullable::<#inner>()) #default)
        };
    }

    let ty = &param.ty;
    let declared = if param.optional && param.default.is_none() {
        quote!(::herald::DeclaredType::of_default::<#ty>())
    } else {
        quote!(::herald::DeclaredType::of::<#ty>())
    };
    let nullable = param.optional.then(|| quote!(.nullable()));
    let default = param
        .default
        .as_ref()
        .map(|expr| quote!(.default::<#ty>(#expr)));

    quote! {
        .param(::herald::ParamDecl::new(#name, #declared) #nullable #default)
    }
}

/// `let __argN = ...;` reading one argument from the invocation
fn argument_binding(index: usize, param: &ArgumentParam, ident: &Ident) -> TokenStream2 {
    let read = match option_inner(&param.ty) {
        Some(inner) => quote!(optional::<#inner>(#index)),
        None => {
            let ty = &param.ty;
            quote!(required::<#ty>(#index))
        }
    };

    quote! {
        let #ident = match __invocation.arguments().#read {
            ::core::result::Result::Ok(value) => value,
            ::core::result::Result::Err(err) => {
                return ::core::result::Result::Err(::herald::DispatchError::from(err))
            }
        };
    }
}

/// `T` for a type written as `Option<T>` (or a path ending in `Option<T>`)
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return None;
    };
    let segment = path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(generics) = &segment.arguments else {
        return None;
    };
    match generics.args.first()? {
        GenericArgument::Type(inner) if generics.args.len() == 1 => Some(inner),
        _ => None,
    }
}

/// Doc comment lines of the handler, joined with spaces
fn doc_description(func: &ItemFn) -> Option<String> {
    let lines: Vec<String> = func
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(text),
                    ..
                }) => Some(text.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    (!lines.is_empty()).then(|| lines.join(" "))
}
