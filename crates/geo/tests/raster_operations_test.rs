#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{
        CellSize, ChunkLayout, Crs, Error, GeoReference, NumThreads, Point, RasterArray, RasterConfig, RasterDataset, RasterSize,
        algo::{
            self, ClipOptions, InterpolateOptions, InterpolationMethod, ReprojectOptions, Resampling, clip_box, geometry_mask, interpolate_na,
            reproject, reproject_match,
        },
        crs::epsg,
        transform_from_coords,
    };
    use geo_types::{Geometry, polygon};
    use ndarray::{Array2, Array3};

    fn wgs84_grid(size: usize, top_left: Point) -> GeoReference {
        GeoReference::with_top_left_origin(
            Some(Crs::from_epsg(epsg::WGS84).unwrap()),
            RasterSize::square(size),
            top_left,
            CellSize::square(1.0),
        )
    }

    fn raster_10x10(cfg: &RasterConfig) -> RasterArray<f32> {
        let data = Array2::from_shape_fn((10, 10), |(row, col)| (row * 10 + col) as f32);
        RasterArray::from_grid(data, &wgs84_grid(10, Point::new(0.0, 10.0)), cfg).unwrap()
    }

    #[test_log::test]
    fn clip_box_on_a_10x10_grid() {
        let cfg = RasterConfig::default();
        let arr = raster_10x10(&cfg);

        let clipped = clip_box(&arr, 2.0, 2.0, 4.0, 4.0, false, 0, &cfg).unwrap();
        assert_eq!(clipped.shape(), &[2, 2]);
        assert_eq!(clipped.data()[[0, 0]], 62.0);
        assert_eq!(clipped.data()[[1, 1]], 73.0);
        assert_eq!(clipped.bounds(&cfg).unwrap().bounds(), (2.0, 2.0, 4.0, 4.0));

        let expanded = clip_box(&arr, 2.0, 2.0, 2.5, 2.5, true, 3, &cfg).unwrap();
        assert!(expanded.width(&cfg).unwrap() >= 2);
        assert!(expanded.height(&cfg).unwrap() >= 2);

        assert!(matches!(
            clip_box(&arr, 2.0, 2.0, 2.5, 2.5, true, 0, &cfg),
            Err(Error::OneDimensionalRaster(_))
        ));
    }

    #[test_log::test]
    fn reproject_uniform_raster_with_nearest() {
        let cfg = RasterConfig::default();
        let arr = RasterArray::from_grid(Array2::from_elem((5, 5), 5.0f64), &wgs84_grid(5, Point::new(4.0, 51.0)), &cfg)
            .unwrap()
            .write_nodata(Some(-1.0));

        let projected = reproject(&arr, "EPSG:3857", &ReprojectOptions::with_resampling(Resampling::Nearest), &cfg).unwrap();
        assert_eq!(projected.crs().unwrap().unwrap().epsg(), Some(epsg::WGS84_WEB_MERCATOR));
        assert_eq!(projected.nodata(), Some(-1.0));
        assert!(projected.data().iter().all(|&v| v == 5.0 || v == -1.0));
        assert!(projected.data().iter().filter(|&&v| v == 5.0).count() > 10);
    }

    #[test]
    fn transform_bounds_round_trip() {
        let wgs84 = Crs::from_epsg(epsg::WGS84).unwrap();
        let laea = Crs::from_epsg(epsg::ETRS89_LAEA).unwrap();

        let bbox = geo::Rect::from_bounds(9.5, 51.5, 10.5, 52.5);
        let projected = algo::transform_bounds(&bbox, &wgs84, &laea, 21).unwrap();
        let back = algo::transform_bounds(&projected, &laea, &wgs84, 21).unwrap();

        assert_relative_eq!(back.min_x(), bbox.min_x(), epsilon = 0.05);
        assert_relative_eq!(back.max_x(), bbox.max_x(), epsilon = 0.05);
        assert_relative_eq!(back.min_y(), bbox.min_y(), epsilon = 0.05);
        assert_relative_eq!(back.max_y(), bbox.max_y(), epsilon = 0.05);
    }

    #[test]
    fn derived_transform_reconstructs_the_coordinate_extent() {
        let x: Vec<f64> = (0..20).map(|i| 100_000.0 + 25.0 * i as f64).collect();
        let y: Vec<f64> = (0..10).map(|i| 200_000.0 - 25.0 * i as f64).collect();

        let transform = transform_from_coords("x", &x, "y", &y, 1e-3).unwrap();
        let grid = GeoReference::new(None, RasterSize::with_rows_cols(10, 20), transform);
        let (min_x, min_y, max_x, max_y) = grid.bounding_box().bounds();

        assert_relative_eq!(min_x, x[0] - 12.5);
        assert_relative_eq!(max_x, x[19] + 12.5);
        assert_relative_eq!(max_y, y[0] + 12.5);
        assert_relative_eq!(min_y, y[9] - 12.5);
    }

    #[test]
    fn reproject_match_against_itself_is_the_identity() {
        let cfg = RasterConfig::default();
        let arr = raster_10x10(&cfg);

        let matched = reproject_match(&arr, &arr, &ReprojectOptions::default(), &cfg).unwrap();
        assert_eq!(matched.data(), arr.data());
        assert_eq!(matched.coords("x"), arr.coords("x"));
        assert_eq!(matched.coords("y"), arr.coords("y"));
    }

    #[test]
    fn inverted_mask_is_the_complement() {
        let grid = wgs84_grid(10, Point::new(0.0, 10.0));
        let triangle = Geometry::Polygon(polygon![(x: 1.2, y: 1.3), (x: 8.7, y: 2.1), (x: 4.4, y: 9.2)]);

        for all_touched in [false, true] {
            let mask = geometry_mask(std::slice::from_ref(&triangle), None, &grid, all_touched, false).unwrap();
            let inverted = geometry_mask(std::slice::from_ref(&triangle), None, &grid, all_touched, true).unwrap();
            assert!(mask.iter().any(|v| *v));
            assert!(mask.iter().zip(inverted.iter()).all(|(a, b)| a != b));
        }
    }

    #[test]
    fn clip_to_a_geometry() {
        let cfg = RasterConfig::default();
        let arr = raster_10x10(&cfg);
        let square = Geometry::Polygon(polygon![(x: 2.0, y: 2.0), (x: 5.0, y: 2.0), (x: 5.0, y: 5.0), (x: 2.0, y: 5.0)]);

        let opts = ClipOptions {
            drop: true,
            ..Default::default()
        };
        let clipped = algo::clip(&arr, &[square], None, &opts, &cfg).unwrap();
        assert_eq!(clipped.shape(), &[3, 3]);
        assert_eq!(clipped.data()[[0, 0]], 52.0);
    }

    #[test_log::test]
    fn clip_declares_the_nodata_value_it_writes() {
        let cfg = RasterConfig::default();
        let data = Array2::from_shape_fn((10, 10), |(row, col)| (row * 10 + col) as u8);
        let arr = RasterArray::from_grid(data, &wgs84_grid(10, Point::new(0.0, 10.0)), &cfg)
            .unwrap()
            .write_nodata(Some(-1.0));
        let triangle = Geometry::Polygon(polygon![(x: 1.2, y: 1.3), (x: 8.7, y: 2.1), (x: 4.4, y: 9.2)]);

        let clipped = algo::clip(&arr, &[triangle], None, &ClipOptions::default(), &cfg).unwrap();
        let outside = clipped.data()[[0, 0]];
        assert_eq!(clipped.nodata(), Some(f64::from(outside)));
        assert_eq!(outside, u8::MAX);
    }

    #[test]
    fn interpolate_na_is_idempotent() {
        let cfg = RasterConfig::default();
        let data = Array2::from_shape_fn((10, 10), |(row, col)| {
            if (row + col) % 4 == 0 { f32::NAN } else { (row * col) as f32 }
        });
        let arr = RasterArray::from_grid(data, &wgs84_grid(10, Point::new(0.0, 10.0)), &cfg).unwrap();

        for method in [InterpolationMethod::Nearest, InterpolationMethod::Linear] {
            let opts = InterpolateOptions {
                method,
                max_search_distance: None,
            };
            let once = interpolate_na(&arr, &opts, &cfg).unwrap();
            let twice = interpolate_na(&once, &opts, &cfg).unwrap();

            for ((orig, a), b) in arr.data().iter().zip(once.data().iter()).zip(twice.data().iter()) {
                assert!(orig.is_nan() || orig == a);
                assert!(a == b || (a.is_nan() && b.is_nan()));
            }
        }
    }

    #[test_log::test]
    fn chunked_parallel_reprojection_matches_sequential() {
        let grid = wgs84_grid(10, Point::new(3.0, 52.0));
        let data = Array3::from_shape_fn((3, 10, 10), |(band, row, col)| (band * 100 + row * 10 + col) as f64);
        let sequential_cfg = RasterConfig::default();
        let arr = RasterArray::new(["band", "y", "x"], data.into_dyn())
            .unwrap()
            .write_transform(grid.geo_transform())
            .write_crs(epsg::WGS84)
            .unwrap();

        let opts = ReprojectOptions::with_resampling(Resampling::Cubic);
        let expected = reproject(&arr, epsg::BELGIAN_LAMBERT72, &opts, &sequential_cfg).unwrap();

        let parallel_cfg = RasterConfig::builder().num_threads(NumThreads::AllCpus).build();
        let chunked = arr.chunk(ChunkLayout::new().with_chunk("band", 1), &parallel_cfg).unwrap();
        let actual = reproject(&chunked, epsg::BELGIAN_LAMBERT72, &opts, &parallel_cfg).unwrap();

        assert_eq!(expected.shape(), actual.shape());
        assert_eq!(expected.dims(), actual.dims());
        for (a, b) in expected.data().iter().zip(actual.data().iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn dataset_operations() {
        let cfg = RasterConfig::default();
        let band_info = RasterArray::new(["band"], ndarray::arr1(&[1.0f32, 2.0]).into_dyn()).unwrap();
        let ds = RasterDataset::new()
            .with_var("elevation", raster_10x10(&cfg))
            .with_var("band_info", band_info);

        assert_eq!(ds.vars(&cfg), vec!["elevation"]);

        let projected = algo::reproject_dataset(&ds, epsg::WGS84_WEB_MERCATOR, &ReprojectOptions::default(), &cfg).unwrap();
        assert_eq!(projected.crs(&cfg).unwrap().unwrap().epsg(), Some(epsg::WGS84_WEB_MERCATOR));
        assert_eq!(projected.get("band_info").unwrap().data(), ds.get("band_info").unwrap().data());

        let mismatch = ds.with_var(
            "other",
            RasterArray::from_grid(Array2::<f32>::zeros((5, 5)), &wgs84_grid(5, Point::new(0.0, 10.0)), &cfg).unwrap(),
        );
        assert!(matches!(
            algo::clip_box_dataset(&mismatch, 2.0, 2.0, 4.0, 4.0, false, 0, &cfg),
            Err(Error::DimensionMismatch(_))
        ));
    }
}
