/// Fixed description of one page kind.
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Config sections recorded on the page when it is added.
    pub config_sections: &'static [&'static str],
    pub variables: &'static [(&'static str, &'static str)],
}

impl PageSpec {
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|(v, _)| *v == name)
    }
}

pub const PAGES: &[PageSpec] = &[
    PageSpec {
        name: "basic_info",
        description: "Information shared by every stage: tiles, rounds and channels in use, the anchor \
                      and DAPI channels, tile shape and pixel sizes.",
        config_sections: &["basic_info"],
        variables: &[
            ("n_tiles", "Number of tiles in the experiment."),
            ("n_rounds", "Number of sequencing rounds, excluding the anchor."),
            ("n_channels", "Number of channels imaged in every round."),
            ("use_tiles", "Tile indices processed by the pipeline."),
            ("use_rounds", "Sequencing round indices processed by the pipeline."),
            ("use_channels", "Sequencing channel indices processed by the pipeline."),
            ("use_anchor", "Whether an anchor round was imaged."),
            ("anchor_round", "Index of the anchor round, one past the last sequencing round."),
            ("anchor_channel", "Channel of the anchor round holding all spots."),
            ("dapi_channel", "Channel holding the DAPI stain, if any."),
            ("tile_sz", "Tile size in y and x, in pixels."),
            ("nz", "Number of z planes per tile."),
            ("tile_centre", "Centre of a tile as [y, x, z] in local pixels."),
            ("pixel_size_xy", "Pixel size in y and x, in microns."),
            ("pixel_size_z", "Distance between z planes, in microns."),
            ("bad_trc", "Tile, round and channel triples whose images are unusable."),
        ],
    },
    PageSpec {
        name: "extract",
        description: "Location and shape of the tile stacks the pipeline reads.",
        config_sections: &["file_names"],
        variables: &[
            ("file_type", "Format of the tile stacks."),
            ("tile_paths", "Path of the raw stack of every tile, empty for unused tiles."),
            ("tile_shape", "Shape [y, x, z] of every tile image."),
            ("n_rounds_stored", "Rounds stored per stack, including the anchor."),
        ],
    },
    PageSpec {
        name: "filter",
        description: "Filtered tile stacks and the auto threshold of every image.",
        config_sections: &["filter"],
        variables: &[
            ("auto_thresh", "Spot detection threshold indexed [tile][round][channel]."),
            ("filtered_paths", "Path of the filtered stack of every tile, empty for unused tiles."),
        ],
    },
    PageSpec {
        name: "filter_debug",
        description: "Filter settings and timings kept for inspection.",
        config_sections: &["filter"],
        variables: &[
            ("z_info", "Z plane the auto threshold is computed on."),
            ("r_dapi", "Radius of the DAPI top-hat kernel, if used."),
            ("r1", "Inner radius of the difference of hanning filter, if used."),
            ("r2", "Outer radius of the difference of hanning filter, if used."),
            ("invalid_auto_thresh", "Auto threshold value marking images that were not filtered."),
            ("time_taken", "Seconds spent filtering."),
        ],
    },
    PageSpec {
        name: "find_spots",
        description: "Point clouds of every tile, round and channel.",
        config_sections: &["find_spots"],
        variables: &[
            ("spot_yxz", "Local [y, x, z] of every spot, grouped by tile, round and channel."),
            ("spot_no", "Number of spots indexed [tile][round][channel]."),
            ("isolated_spots", "Whether each anchor spot has no neighbour within the isolation radius."),
        ],
    },
    PageSpec {
        name: "stitch",
        description: "Global position of every tile.",
        config_sections: &["stitch"],
        variables: &[
            ("tile_origin", "Global [y, x, z] of the first pixel of every tile, null if unused."),
            ("source", "Where the tile origins came from."),
        ],
    },
    PageSpec {
        name: "register",
        description: "Affine transforms from the anchor frame to every round and channel.",
        config_sections: &["file_names"],
        variables: &[(
            "transform",
            "4x3 affine indexed [tile][round][channel], applied to [y x z 1] row vectors.",
        )],
    },
    PageSpec {
        name: "register_debug",
        description: "Provenance of the registration transforms.",
        config_sections: &["file_names"],
        variables: &[
            ("source_path", "File the transforms were read from, null for identity."),
            ("n_non_identity", "Number of transforms that differ from identity."),
        ],
    },
    PageSpec {
        name: "ref_spots",
        description: "Anchor spots after duplicate removal with their colours in every round.",
        config_sections: &["find_spots"],
        variables: &[
            ("local_yxz", "Local [y, x, z] of each reference spot."),
            ("isolated", "Whether each reference spot is isolated."),
            ("tile", "Tile each reference spot was found on."),
            ("colours", "Raw colour of each spot indexed [spot][round][channel]."),
        ],
    },
    PageSpec {
        name: "call_spots",
        description: "Colour normalisation, bleed matrix, gene efficiency, bled codes and the gene \
                      assigned to each reference spot.",
        config_sections: &["call_spots"],
        variables: &[
            ("gene_names", "Name of every gene in the code book."),
            ("gene_codes", "Dye of every gene in every sequencing round."),
            ("colour_norm_factor", "Multiplier applied to colours, indexed [round][channel]."),
            ("initial_bleed_matrix", "Bleed matrix before estimation."),
            ("bleed_matrix", "Bleed matrix estimated from confidently assigned spots."),
            ("gene_efficiency", "Relative strength of each gene in each round."),
            ("bled_codes", "Expected unit-norm colour of every gene."),
            ("use_ge", "Whether each reference spot was used to compute gene efficiency."),
            ("background", "Per-channel background removed from each reference spot."),
            ("gene_no", "Gene assigned to each reference spot."),
            ("gene_score", "Dot product score of the assigned gene."),
            ("gene_score_second", "Dot product score of the second best gene."),
            ("intensity", "Median over rounds of the brightest channel of each spot."),
        ],
    },
    PageSpec {
        name: "omp",
        description: "Gene spots found by orthogonal matching pursuit over every pixel.",
        config_sections: &["omp"],
        variables: &[
            ("spot_tile", "Tile the mean spot shape was computed on."),
            ("mean_spot", "Mean coefficient image around isolated spots."),
            ("spot", "Footprint of the mean spot used for scoring, ones and zeros."),
            ("local_yxz", "Local [y, x, z] of each OMP spot."),
            ("scores", "Score of each OMP spot."),
            ("tile", "Tile of each OMP spot."),
            ("gene_no", "Gene of each OMP spot."),
            ("colours", "Raw colour of each OMP spot indexed [spot][round][channel]."),
        ],
    },
    PageSpec {
        name: "thresholds",
        description: "Thresholds a spot must pass to be reported.",
        config_sections: &["thresholds"],
        variables: &[
            ("score_ref", "Minimum dot product score of a reference spot."),
            ("score_omp", "Minimum score of an OMP spot."),
            ("intensity", "Minimum intensity of a reference spot."),
            ("n_ref_pass", "Reference spots passing the thresholds."),
            ("n_omp_pass", "OMP spots passing the thresholds."),
        ],
    },
    PageSpec {
        name: "debug",
        description: "Page used to exercise the notebook.",
        config_sections: &[],
        variables: &[("a", "First test variable."), ("b", "Second test variable.")],
    },
];

pub fn find(name: &str) -> Option<&'static PageSpec> {
    PAGES.iter().find(|p| p.name == name)
}

pub fn page_names() -> Vec<&'static str> {
    PAGES.iter().map(|p| p.name).collect()
}
