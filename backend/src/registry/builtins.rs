// Built-in kinds and forward routines

use super::{
    Constructor, Factory, KwargDecl, KwargDefault, KwargType, LensDeps, ModelArgs,
};
use crate::forward::{ConvergenceMap, ForwardRoutine, LensSource, Unlensed};
use crate::models::cosmology::FLAT_LAMBDA_CDM_PARAMS;
use crate::models::lenses::{POINT_PARAMS, SIE_PARAMS, SIS_PARAMS};
use crate::models::light::SERSIC_PARAMS;
use crate::models::{
    Cosmology, FlatLambdaCDM, Lens, LightSource, Multiplane, NumericError, Point, Sersic, Sie, Sis,
};
use crate::sims::kwargs::{LENS_SOURCE_KWARGS, LENS_SOURCE_PARAMS};
use std::sync::Arc;

const CORE_RADIUS: KwargDecl = KwargDecl::new(
    "s",
    KwargType::Float,
    KwargDefault::Float(0.0),
    "Core radius (softening length) in arcsec",
);

pub(super) fn factories() -> Vec<Factory> {
    vec![
        Factory {
            kind: "FlatLambdaCDM".into(),
            description: "Flat Lambda-CDM cosmology",
            params: FLAT_LAMBDA_CDM_PARAMS.to_vec(),
            kwargs: vec![],
            constructor: Constructor::Cosmology(flat_lambda_cdm),
        },
        Factory {
            kind: "SIE".into(),
            description: "Singular isothermal ellipsoid",
            params: SIE_PARAMS.to_vec(),
            kwargs: vec![CORE_RADIUS],
            constructor: Constructor::Lens(sie),
        },
        Factory {
            kind: "SIS".into(),
            description: "Singular isothermal sphere",
            params: SIS_PARAMS.to_vec(),
            kwargs: vec![CORE_RADIUS],
            constructor: Constructor::Lens(sis),
        },
        Factory {
            kind: "Point".into(),
            description: "Point mass",
            params: POINT_PARAMS.to_vec(),
            kwargs: vec![CORE_RADIUS],
            constructor: Constructor::Lens(point),
        },
        Factory {
            kind: "Multiplane".into(),
            description: "Ordered stack of lens planes",
            params: vec![],
            kwargs: vec![],
            constructor: Constructor::Lens(multiplane),
        },
        Factory {
            kind: "Sersic".into(),
            description: "Elliptical Sersic light profile",
            params: SERSIC_PARAMS.to_vec(),
            kwargs: vec![
                KwargDecl::new(
                    "s",
                    KwargType::Float,
                    KwargDefault::Float(0.0),
                    "Softening added to the elliptical radius in arcsec",
                ),
                KwargDecl::new(
                    "use_lenstronomy_k",
                    KwargType::Bool,
                    KwargDefault::Bool(false),
                    "Use the linear approximation of the Sersic normalisation",
                ),
            ],
            constructor: Constructor::Source(sersic),
        },
        Factory {
            kind: "Lens_Source".into(),
            description: "Lensed source image on a pixel grid",
            params: LENS_SOURCE_PARAMS.to_vec(),
            kwargs: LENS_SOURCE_KWARGS.to_vec(),
            constructor: Constructor::Simulator {
                default_forward: "lens_source",
            },
        },
    ]
}

pub(super) fn forwards() -> Vec<Arc<dyn ForwardRoutine>> {
    let routines: [Arc<dyn ForwardRoutine>; 3] = [
        Arc::new(LensSource),
        Arc::new(Unlensed),
        Arc::new(ConvergenceMap),
    ];
    routines.to_vec()
}

fn flat_lambda_cdm(args: &ModelArgs) -> Result<Arc<dyn Cosmology>, NumericError> {
    Ok(Arc::new(FlatLambdaCDM::new(&args.name)))
}

fn sie(args: &ModelArgs, deps: LensDeps) -> Result<Arc<dyn Lens>, NumericError> {
    Ok(Arc::new(Sie::new(&args.name, deps.cosmology, args.float("s")?)))
}

fn sis(args: &ModelArgs, deps: LensDeps) -> Result<Arc<dyn Lens>, NumericError> {
    Ok(Arc::new(Sis::new(&args.name, deps.cosmology, args.float("s")?)))
}

fn point(args: &ModelArgs, deps: LensDeps) -> Result<Arc<dyn Lens>, NumericError> {
    Ok(Arc::new(Point::new(&args.name, deps.cosmology, args.float("s")?)))
}

fn multiplane(args: &ModelArgs, deps: LensDeps) -> Result<Arc<dyn Lens>, NumericError> {
    Ok(Arc::new(Multiplane::new(&args.name, deps.children)))
}

fn sersic(args: &ModelArgs) -> Result<Arc<dyn LightSource>, NumericError> {
    Ok(Arc::new(Sersic::new(
        &args.name,
        args.float("s")?,
        args.flag("use_lenstronomy_k")?,
    )))
}
