//! Property grid: for representative (integer, SSE) argument shapes, the
//! wrapped call and the exported raw pointer must both reproduce a
//! position-weighted direct computation.

use trampoline::Trampoline;

// Each argument contributes `position * value`, so a mis-shifted register
// or a mis-slid stack slot changes the result.
macro_rules! shape_test {
    ($name:ident, $ret:ty, $(($arg:ident, $ty:ty, $val:expr)),+ $(,)?) => {
        paste::paste! {
            #[test]
            fn [<shape_ $name>]() {
                let f = |$($arg: $ty),+| -> $ret {
                    let mut acc = 0 as $ret;
                    let mut weight = 0 as $ret;
                    $(
                        weight += 1 as $ret;
                        acc += ($arg as $ret) * weight;
                    )+
                    acc
                };

                let tr = Trampoline::<fn($($ty),+) -> $ret>::new(f).unwrap();
                let direct = f($($val),+);
                assert_eq!(tr.call(($($val,)+)), direct);

                let p = tr.raw().unwrap();
                assert_eq!(unsafe { p($($val),+) }, direct);
            }
        }
    };
}

shape_test!(int_1, i64, (a, i64, 5));
shape_test!(int_2, i64, (a, i64, 3), (b, i64, 9));
shape_test!(
    int_5,
    i64,
    (a, i64, 1),
    (b, i64, 2),
    (c, i64, 3),
    (d, i64, 4),
    (e, i64, 5)
);
shape_test!(
    int_6,
    i64,
    (a, i64, 11),
    (b, i64, 12),
    (c, i64, 13),
    (d, i64, 14),
    (e, i64, 15),
    (f, i64, 16)
);
shape_test!(
    int_7,
    i64,
    (a, i64, 21),
    (b, i64, 22),
    (c, i64, 23),
    (d, i64, 24),
    (e, i64, 25),
    (f, i64, 26),
    (g, i64, 27)
);
shape_test!(
    int_10,
    i64,
    (a, i64, 1),
    (b, i64, 2),
    (c, i64, 3),
    (d, i64, 4),
    (e, i64, 5),
    (f, i64, 6),
    (g, i64, 7),
    (h, i64, 8),
    (i, i64, 9),
    (j, i64, 10)
);
shape_test!(
    int_14,
    i64,
    (a, i64, 14),
    (b, i64, 13),
    (c, i64, 12),
    (d, i64, 11),
    (e, i64, 10),
    (f, i64, 9),
    (g, i64, 8),
    (h, i64, 7),
    (i, i64, 6),
    (j, i64, 5),
    (k, i64, 4),
    (l, i64, 3),
    (m, i64, 2),
    (n, i64, 1)
);

shape_test!(sse_1, f64, (a, f64, 2.0));
shape_test!(
    sse_8,
    f64,
    (a, f64, 1.0),
    (b, f64, 2.0),
    (c, f64, 3.0),
    (d, f64, 4.0),
    (e, f64, 5.0),
    (f, f64, 6.0),
    (g, f64, 7.0),
    (h, f64, 8.0)
);
shape_test!(
    sse_10,
    f64,
    (a, f64, 1.0),
    (b, f64, 2.0),
    (c, f64, 3.0),
    (d, f64, 4.0),
    (e, f64, 5.0),
    (f, f64, 6.0),
    (g, f64, 7.0),
    (h, f64, 8.0),
    (i, f64, 9.0),
    (j, f64, 10.0)
);

shape_test!(mixed_2i_3s, f64, (a, i64, 7), (b, f64, 2.0), (c, i64, 9), (d, f64, 4.0), (e, f64, 6.0));
shape_test!(
    mixed_5i_8s,
    f64,
    (a, i64, 1),
    (b, f64, 2.0),
    (c, i64, 3),
    (d, f64, 4.0),
    (e, i64, 5),
    (f, f64, 6.0),
    (g, i64, 7),
    (h, f64, 8.0),
    (i, i64, 9),
    (j, f64, 10.0),
    (k, f64, 11.0),
    (l, f64, 12.0),
    (m, f64, 13.0)
);
shape_test!(
    mixed_7i_2s,
    i64,
    (a, i64, 2),
    (b, f64, 3.0),
    (c, i64, 5),
    (d, i64, 7),
    (e, f64, 11.0),
    (f, i64, 13),
    (g, i64, 17),
    (h, i64, 19),
    (i, i64, 23)
);
shape_test!(
    mixed_8i_6s,
    f64,
    (a, i64, 1),
    (b, i64, 2),
    (c, i64, 3),
    (d, i64, 4),
    (e, i64, 5),
    (f, i64, 6),
    (g, i64, 7),
    (h, i64, 8),
    (i, f64, 9.0),
    (j, f64, 10.0),
    (k, f64, 11.0),
    (l, f64, 12.0),
    (m, f64, 13.0),
    (n, f64, 14.0)
);

#[test]
fn shape_no_arguments() {
    let tr = Trampoline::<fn() -> i64>::new(|| 7i64).unwrap();
    assert_eq!(tr.call(()), 7);
    let p = tr.raw().unwrap();
    assert_eq!(unsafe { p() }, 7);
}
